//! Declarative YAML story replay.
//!
//! A story is a list of steps executed strictly in order, no branching.
//! Each step carries a `step` metadata block (the action name, optional
//! presentation and control fields) and the remaining keys form the
//! request body for that action. Assets created earlier in a story are
//! referenced later through their `asset_label`.
//!
//! ```yaml
//! steps:
//!   - step:
//!       action: ASSETS_CREATE
//!       description: Create the door asset
//!       asset_label: front door
//!       confirm: true
//!     behaviours: [RecordEvidence, Attachments]
//!     attributes:
//!       arc_display_name: Front door
//!   - step:
//!       action: EVENTS_CREATE
//!       asset_label: front door
//!       print_response: true
//!     operation: Record
//!     behaviour: RecordEvidence
//!     event_attributes:
//!       arc_description: Door opened
//! ```

use std::collections::HashMap;
use std::time::Duration;

use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::time::sleep;
use tracing::{debug, info, instrument};

use crate::Result;
use crate::client::ArchivistClient;
use crate::error::Error;
use crate::resources::ResourceRecord;

/// A parsed story file.
#[derive(Debug, Clone, Deserialize)]
pub struct Story {
    /// The steps, in execution order.
    pub steps: Vec<Step>,
}

impl Story {
    /// Parse a story from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML does not describe a story.
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// One step: control metadata plus the request body.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// The metadata block.
    pub step: StepMeta,
    /// Every other key, passed to the action as its body.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

/// The `step` metadata block controlling one action.
#[derive(Debug, Clone, Deserialize)]
pub struct StepMeta {
    /// Name of the action to run, from the fixed registry.
    pub action: String,
    /// Free-text description, logged before the step runs.
    #[serde(default)]
    pub description: Option<String>,
    /// Seconds to sleep before running the action.
    #[serde(default)]
    pub wait_time: Option<f64>,
    /// Pretty-print the action's response to stdout.
    #[serde(default)]
    pub print_response: Option<bool>,
    /// Label binding (for creates) or referencing (for later steps)
    /// an asset created in this story.
    #[serde(default)]
    pub asset_label: Option<String>,
    /// Page size for listing actions.
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Wait for confirmation on creating actions.
    #[serde(default)]
    pub confirm: Option<bool>,
}

/// The fixed set of actions a story may name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    AssetsCreate,
    AssetsCount,
    AssetsList,
    AssetsWaitForConfirmed,
    EventsCreate,
    EventsCount,
    EventsList,
    LocationsCreate,
    LocationsCount,
    LocationsList,
    CompliancePoliciesCreate,
    ComplianceCompliantAt,
}

impl Action {
    fn from_name(name: &str) -> Result<Self> {
        let action = match name {
            "ASSETS_CREATE" => Self::AssetsCreate,
            "ASSETS_COUNT" => Self::AssetsCount,
            "ASSETS_LIST" => Self::AssetsList,
            "ASSETS_WAIT_FOR_CONFIRMED" => Self::AssetsWaitForConfirmed,
            "EVENTS_CREATE" => Self::EventsCreate,
            "EVENTS_COUNT" => Self::EventsCount,
            "EVENTS_LIST" => Self::EventsList,
            "LOCATIONS_CREATE" => Self::LocationsCreate,
            "LOCATIONS_COUNT" => Self::LocationsCount,
            "LOCATIONS_LIST" => Self::LocationsList,
            "COMPLIANCE_POLICIES_CREATE" => Self::CompliancePoliciesCreate,
            "COMPLIANCE_COMPLIANT_AT" => Self::ComplianceCompliantAt,
            _ => {
                return Err(Error::InvalidOperation {
                    action: name.to_owned(),
                });
            }
        };
        Ok(action)
    }
}

/// Replays stories against one client.
///
/// The runner remembers the identities of assets created under an
/// `asset_label` so later steps can address them.
pub struct Runner {
    client: ArchivistClient,
    assets: HashMap<String, String>,
}

impl Runner {
    /// Create a runner executing against `client`.
    pub fn new(client: ArchivistClient) -> Self {
        Self {
            client,
            assets: HashMap::new(),
        }
    }

    /// Run every step of `story` in order.
    ///
    /// Execution stops at the first failing step; whatever earlier steps
    /// created stays created.
    pub async fn run(&mut self, story: &Story) -> Result<()> {
        for (index, step) in story.steps.iter().enumerate() {
            info!(
                step = index + 1,
                action = %step.step.action,
                description = step.step.description.as_deref().unwrap_or(""),
                "running step"
            );

            if let Some(wait) = step.step.wait_time.filter(|wait| *wait > 0.0) {
                debug!(wait_s = wait, "pausing before step");
                sleep(Duration::from_secs_f64(wait)).await;
            }

            let output = self.execute(step).await?;
            if step.step.print_response.unwrap_or(false) {
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }
        Ok(())
    }

    #[instrument(skip(self, step), fields(action = %step.step.action))]
    async fn execute(&mut self, step: &Step) -> Result<Value> {
        let action = Action::from_name(&step.step.action)?;
        let meta = &step.step;
        let body = step.body.clone();

        match action {
            Action::AssetsCreate => {
                let confirm = meta.confirm.unwrap_or(false);
                let record = self
                    .client
                    .assets()
                    .create_from_body(Value::Object(body), confirm)
                    .await?;
                if let (Some(label), Some(identity)) = (&meta.asset_label, record.identity()) {
                    debug!(label, identity, "labelled asset");
                    self.assets.insert(label.clone(), identity.to_owned());
                }
                Ok(record.into_value())
            }
            Action::AssetsCount => {
                let count = self.client.assets().count(filter_from(body)).await?;
                Ok(json!(count))
            }
            Action::AssetsList => {
                let records: Vec<ResourceRecord> = self
                    .client
                    .assets()
                    .list(meta.page_size, filter_from(body))
                    .try_collect()
                    .await?;
                Ok(serde_json::to_value(records)?)
            }
            Action::AssetsWaitForConfirmed => {
                self.client
                    .assets()
                    .wait_for_confirmed(filter_from(body))
                    .await?;
                Ok(json!({}))
            }
            Action::EventsCreate => {
                let asset = self.labelled_asset(meta)?;
                let confirm = meta.confirm.unwrap_or(false);
                let (props, attributes) = split_body(body, "event_attributes");
                let record = self
                    .client
                    .events()
                    .create(&asset, props, attributes, confirm)
                    .await?;
                Ok(record.into_value())
            }
            Action::EventsCount => {
                let asset = self.labelled_asset_opt(meta)?;
                let count = self
                    .client
                    .events()
                    .count(asset.as_deref(), filter_from(body))
                    .await?;
                Ok(json!(count))
            }
            Action::EventsList => {
                let asset = self.labelled_asset_opt(meta)?;
                let records: Vec<ResourceRecord> = self
                    .client
                    .events()
                    .list(asset.as_deref(), meta.page_size, filter_from(body))
                    .try_collect()
                    .await?;
                Ok(serde_json::to_value(records)?)
            }
            Action::LocationsCreate => {
                let (props, attributes) = split_body(body, "attributes");
                let record = self.client.locations().create(props, attributes).await?;
                Ok(record.into_value())
            }
            Action::LocationsCount => {
                let count = self.client.locations().count(filter_from(body)).await?;
                Ok(json!(count))
            }
            Action::LocationsList => {
                let records: Vec<ResourceRecord> = self
                    .client
                    .locations()
                    .list(meta.page_size, filter_from(body))
                    .try_collect()
                    .await?;
                Ok(serde_json::to_value(records)?)
            }
            Action::CompliancePoliciesCreate => {
                let record = self
                    .client
                    .compliance_policies()
                    .create(Value::Object(body))
                    .await?;
                Ok(record.into_value())
            }
            Action::ComplianceCompliantAt => {
                let asset = self.labelled_asset(meta)?;
                let record = self.client.compliance().compliant_at(&asset, None).await?;
                Ok(record.into_value())
            }
        }
    }

    /// Identity bound to the step's `asset_label`, required.
    fn labelled_asset(&self, meta: &StepMeta) -> Result<String> {
        let label = meta.asset_label.as_deref().ok_or_else(|| {
            Error::IllegalArgument {
                message: format!("{} requires an asset_label", meta.action),
            }
        })?;
        self.assets
            .get(label)
            .cloned()
            .ok_or_else(|| Error::IllegalArgument {
                message: format!("no asset was created under the label '{label}'"),
            })
    }

    /// Identity bound to the step's `asset_label`, when one is named.
    fn labelled_asset_opt(&self, meta: &StepMeta) -> Result<Option<String>> {
        match meta.asset_label {
            Some(_) => Ok(Some(self.labelled_asset(meta)?)),
            None => Ok(None),
        }
    }
}

/// Non-empty body as a filter.
fn filter_from(body: Map<String, Value>) -> Option<Value> {
    if body.is_empty() {
        None
    } else {
        Some(Value::Object(body))
    }
}

/// Split one named key out of the body: (rest, named value).
fn split_body(mut body: Map<String, Value>, key: &str) -> (Value, Value) {
    let named = body.remove(key).unwrap_or_else(|| json!({}));
    (Value::Object(body), named)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_registry_names_resolve() {
        for name in [
            "ASSETS_CREATE",
            "ASSETS_COUNT",
            "ASSETS_LIST",
            "ASSETS_WAIT_FOR_CONFIRMED",
            "EVENTS_CREATE",
            "EVENTS_COUNT",
            "EVENTS_LIST",
            "LOCATIONS_CREATE",
            "LOCATIONS_COUNT",
            "LOCATIONS_LIST",
            "COMPLIANCE_POLICIES_CREATE",
            "COMPLIANCE_COMPLIANT_AT",
        ] {
            assert!(Action::from_name(name).is_ok(), "{name} should resolve");
        }
    }

    #[test]
    fn unknown_actions_are_rejected() {
        let err = Action::from_name("ASSETS_DESTROY_ALL").unwrap_err();
        match err {
            Error::InvalidOperation { action } => assert_eq!(action, "ASSETS_DESTROY_ALL"),
            other => panic!("expected InvalidOperation, got {other:?}"),
        }
    }

    #[test]
    fn story_parses_meta_and_flattened_body() {
        let story = Story::from_yaml(
            r#"
steps:
  - step:
      action: ASSETS_CREATE
      description: Create the door asset
      asset_label: front door
      confirm: true
    behaviours:
      - RecordEvidence
    attributes:
      arc_display_name: Front door
  - step:
      action: ASSETS_COUNT
      print_response: true
      wait_time: 2.5
    attributes:
      arc_display_type: door
"#,
        )
        .unwrap();

        assert_eq!(story.steps.len(), 2);

        let create = &story.steps[0];
        assert_eq!(create.step.action, "ASSETS_CREATE");
        assert_eq!(create.step.asset_label.as_deref(), Some("front door"));
        assert_eq!(create.step.confirm, Some(true));
        assert!(create.body.contains_key("behaviours"));
        assert!(create.body.contains_key("attributes"));
        assert!(!create.body.contains_key("step"));

        let count = &story.steps[1];
        assert_eq!(count.step.wait_time, Some(2.5));
        assert_eq!(count.step.print_response, Some(true));
        assert_eq!(
            count.body["attributes"]["arc_display_type"],
            Value::String("door".to_owned())
        );
    }

    #[test]
    fn malformed_stories_are_rejected() {
        assert!(matches!(
            Story::from_yaml("steps: 7"),
            Err(Error::Yaml(_))
        ));
        assert!(matches!(
            Story::from_yaml("not yaml: ["),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn split_body_separates_the_named_mapping() {
        let mut body = Map::new();
        body.insert("operation".to_owned(), json!("Record"));
        body.insert("event_attributes".to_owned(), json!({"arc_description": "x"}));

        let (props, attributes) = split_body(body, "event_attributes");
        assert_eq!(props, json!({"operation": "Record"}));
        assert_eq!(attributes, json!({"arc_description": "x"}));
    }

    #[test]
    fn split_body_defaults_missing_mappings_to_empty() {
        let (props, attributes) = split_body(Map::new(), "attributes");
        assert_eq!(props, json!({}));
        assert_eq!(attributes, json!({}));
    }

    #[test]
    fn empty_bodies_make_no_filter() {
        assert_eq!(filter_from(Map::new()), None);
        let mut body = Map::new();
        body.insert("tracked".to_owned(), json!("TRACKED"));
        assert_eq!(filter_from(body), Some(json!({"tracked": "TRACKED"})));
    }
}
