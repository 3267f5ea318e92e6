//! Collectors turning device replies into metric samples.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ConnectError;
use crate::rpc::RpcClient;

pub mod alarm;

/// Static description of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

/// One gauge sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Metric {
    pub name: String,
    /// Label name/value pairs in the order of [`MetricDesc::labels`].
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl Metric {
    pub(crate) fn new(desc: &MetricDesc, values: &[&str], value: f64) -> Self {
        Self {
            name: desc.name.to_string(),
            labels: desc
                .labels
                .iter()
                .zip(values)
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            value,
        }
    }

    /// Value of the label called `name`.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(label, _)| label == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A collector knows which commands to send and how to read the replies.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Name of the collector.
    fn name(&self) -> &'static str;

    /// Metric families this collector emits.
    fn describe(&self) -> Vec<MetricDesc>;

    /// Queries the device behind `client`; every sample carries `target` as
    /// its first label.
    async fn collect(&self, client: &RpcClient, target: &str) -> Result<Vec<Metric>, ConnectError>;
}
