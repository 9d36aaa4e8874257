//! Step pipelines: the static recipe for forging one application type.
//!
//! A pipeline is a total order of steps. Each step names the resource kind
//! it creates and where each of its inputs comes from: the request, a
//! literal, a generated name, or an output of an *earlier* step. The
//! ordering rule is checked once when the pipeline is built, so the forge
//! engine can simply walk the steps front to back.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use common::ForgeId;

use crate::error::{Result, SuperkeyError};
use crate::request::CreateRequest;
use crate::resource::ResourceKind;

/// Named outputs of completed steps, keyed by step name.
pub type StepOutputs = HashMap<String, BTreeMap<String, String>>;

/// Where a step input value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// A required request parameter.
    Request(String),
    /// A request parameter that may be absent.
    OptionalRequest(String),
    /// A named output of a prior step in the same run.
    Output { step: String, key: String },
    /// A fixed value.
    Literal(String),
    /// `"{prefix}-{short forge id}"`, unique per run.
    Generated(String),
}

impl InputSource {
    pub fn request(key: impl Into<String>) -> Self {
        InputSource::Request(key.into())
    }

    pub fn optional(key: impl Into<String>) -> Self {
        InputSource::OptionalRequest(key.into())
    }

    pub fn output(step: impl Into<String>, key: impl Into<String>) -> Self {
        InputSource::Output {
            step: step.into(),
            key: key.into(),
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        InputSource::Literal(value.into())
    }

    pub fn generated(prefix: impl Into<String>) -> Self {
        InputSource::Generated(prefix.into())
    }
}

/// A single named input of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInput {
    pub field: String,
    pub source: InputSource,
}

/// One resource-creation operation in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDefinition {
    pub name: String,
    pub kind: ResourceKind,
    pub inputs: Vec<StepInput>,
}

impl StepDefinition {
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            inputs: Vec::new(),
        }
    }

    /// Declares an input for this step.
    pub fn input(mut self, field: impl Into<String>, source: InputSource) -> Self {
        self.inputs.push(StepInput {
            field: field.into(),
            source,
        });
        self
    }

    /// Resolves every declared input for one run.
    ///
    /// Absent optional parameters are simply left out of the result.
    pub fn resolve(
        &self,
        request: &CreateRequest,
        forge_id: ForgeId,
        outputs: &StepOutputs,
    ) -> Result<ResolvedInputs> {
        let mut resolved = ResolvedInputs::new(&self.name);

        for input in &self.inputs {
            let missing = || SuperkeyError::MissingInput {
                step: self.name.clone(),
                input: input.field.clone(),
            };

            let value = match &input.source {
                InputSource::Request(key) => {
                    Some(request.param(key).ok_or_else(missing)?.to_string())
                }
                InputSource::OptionalRequest(key) => request.param(key).map(str::to_string),
                InputSource::Output { step, key } => Some(
                    outputs
                        .get(step)
                        .and_then(|values| values.get(key))
                        .cloned()
                        .ok_or_else(missing)?,
                ),
                InputSource::Literal(value) => Some(value.clone()),
                InputSource::Generated(prefix) => Some(format!("{}-{}", prefix, forge_id.short())),
            };

            if let Some(value) = value {
                resolved.values.insert(input.field.clone(), value);
            }
        }

        Ok(resolved)
    }
}

/// Input values resolved for one step of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInputs {
    step: String,
    values: BTreeMap<String, String>,
}

impl ResolvedInputs {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn step(&self) -> &str {
        &self.step
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Returns the value of a field the resource kind cannot do without.
    pub fn require(&self, field: &str) -> Result<&str> {
        self.get(field).ok_or_else(|| SuperkeyError::MissingInput {
            step: self.step.clone(),
            input: field.to_string(),
        })
    }
}

/// An ordered list of steps for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    provider: String,
    steps: Vec<StepDefinition>,
}

impl Pipeline {
    /// Builds a pipeline, rejecting duplicate step names and output
    /// references to steps that do not come earlier in the list.
    pub fn new(provider: impl Into<String>, steps: Vec<StepDefinition>) -> Result<Self> {
        if steps.is_empty() {
            return Err(SuperkeyError::InvalidPipeline(
                "pipeline has no steps".to_string(),
            ));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for step in &steps {
            for input in &step.inputs {
                if let InputSource::Output { step: source, .. } = &input.source {
                    if !seen.contains(source.as_str()) {
                        return Err(SuperkeyError::InvalidPipeline(format!(
                            "step '{}' reads output of '{}' which does not precede it",
                            step.name, source
                        )));
                    }
                }
            }
            if !seen.insert(step.name.as_str()) {
                return Err(SuperkeyError::InvalidPipeline(format!(
                    "duplicate step name '{}'",
                    step.name
                )));
            }
        }

        Ok(Self {
            provider: provider.into(),
            steps,
        })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Application type for the cost management superkey.
pub const COST_MANAGEMENT: &str = "cost-management";

/// Read-only billing access granted to the cost management role.
const COST_MANAGEMENT_POLICY: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [
        {
            "Sid": "CostUsageReportAccess",
            "Effect": "Allow",
            "Action": [
                "cur:DescribeReportDefinitions",
                "organizations:List*",
                "organizations:Describe*",
                "ce:GetCostAndUsage",
                "ce:GetDimensionValues"
            ],
            "Resource": "*"
        }
    ]
}"#;

/// Maps application types to their pipelines.
#[derive(Debug, Clone, Default)]
pub struct PipelineCatalog {
    pipelines: HashMap<String, Arc<Pipeline>>,
}

impl PipelineCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog of pipelines shipped with the worker.
    pub fn builtin() -> Result<Self> {
        let cost_management = Pipeline::new(
            "aws",
            vec![
                StepDefinition::new("create-policy", ResourceKind::Policy)
                    .input(
                        "name",
                        InputSource::generated("redhat-cost-management-policy"),
                    )
                    .input("document", InputSource::literal(COST_MANAGEMENT_POLICY)),
                StepDefinition::new("create-role", ResourceKind::Role)
                    .input("name", InputSource::generated("redhat-cost-management-role"))
                    .input("trusted_account", InputSource::request("trustedAccountId"))
                    .input("external_id", InputSource::optional("externalId")),
                StepDefinition::new("attach-policy", ResourceKind::PolicyAttachment)
                    .input("policy_arn", InputSource::output("create-policy", "arn"))
                    .input("role_name", InputSource::output("create-role", "name")),
            ],
        )?;

        Ok(Self::new().with(COST_MANAGEMENT, cost_management))
    }

    /// Registers a pipeline, replacing any previous one for the type.
    pub fn with(mut self, application_type: impl Into<String>, pipeline: Pipeline) -> Self {
        self.pipelines
            .insert(application_type.into(), Arc::new(pipeline));
        self
    }

    /// Looks up the pipeline for an application type.
    pub fn resolve(&self, application_type: &str) -> Result<Arc<Pipeline>> {
        self.pipelines
            .get(application_type)
            .cloned()
            .ok_or_else(|| SuperkeyError::UnknownApplicationType(application_type.to_string()))
    }

    /// Returns the registered application types, sorted.
    pub fn application_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.pipelines.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
