//! Chassis and system alarm collector.

use std::collections::HashSet;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use super::{Collector, Metric, MetricDesc};
use crate::error::ConnectError;
use crate::rpc::RpcClient;

const YELLOW_COUNT: MetricDesc = MetricDesc {
    name: "junos_alarms_yellow_count",
    help: "Number of yellow alarms (not silenced)",
    labels: &["target"],
};

const RED_COUNT: MetricDesc = MetricDesc {
    name: "junos_alarms_red_count",
    help: "Number of red alarms (not silenced)",
    labels: &["target"],
};

const ALARM_SET: MetricDesc = MetricDesc {
    name: "junos_alarms_set",
    help: "Alarm active with the details provided in labels",
    labels: &["target", "class", "type", "description"],
};

const SHELL_COMMANDS: &[&str] = &["show system alarms", "show chassis alarms"];

const NETCONF_COMMANDS: &[&str] = &[
    "<get-system-alarm-information/>",
    "<get-alarm-information/>",
];

/// Reply of `show system alarms` / `show chassis alarms`.
#[derive(Debug, Default, Deserialize)]
pub struct AlarmInformation {
    #[serde(rename = "alarm-detail", default)]
    pub details: Vec<AlarmDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AlarmDetail {
    #[serde(rename = "alarm-class", default)]
    pub class: String,
    #[serde(rename = "alarm-description", default)]
    pub description: String,
    #[serde(rename = "alarm-type", default)]
    pub kind: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AlarmCounter {
    pub red: u32,
    pub yellow: u32,
}

/// Counts active alarms, optionally ignoring those matching a filter.
pub struct AlarmCollector {
    filter: Option<Regex>,
}

impl AlarmCollector {
    /// `filter` is matched against alarm description and type; matching
    /// alarms are still reported but not counted.
    pub fn new(filter: Option<&str>) -> Result<Self, regex::Error> {
        let filter = filter
            .filter(|pattern| !pattern.is_empty())
            .map(Regex::new)
            .transpose()?;
        Ok(Self { filter })
    }

    fn should_filter(&self, alarm: &AlarmDetail) -> bool {
        self.filter.as_ref().is_some_and(|filter| {
            filter.is_match(&alarm.description) || filter.is_match(&alarm.kind)
        })
    }

    /// Merges the replies of all alarm commands.
    ///
    /// An alarm whose description was already counted is skipped, so an alarm
    /// raised both as system and chassis alarm counts once.
    pub fn aggregate<I>(&self, replies: I) -> (AlarmCounter, Vec<AlarmDetail>)
    where
        I: IntoIterator<Item = AlarmInformation>,
    {
        let mut counter = AlarmCounter::default();
        let mut alarms = Vec::new();
        let mut seen = HashSet::new();

        for detail in replies.into_iter().flat_map(|reply| reply.details) {
            if seen.contains(&detail.description) {
                continue;
            }

            alarms.push(detail.clone());

            if self.should_filter(&detail) {
                continue;
            }

            match detail.class.as_str() {
                "Major" => counter.red += 1,
                "Minor" => counter.yellow += 1,
                _ => {}
            }

            seen.insert(detail.description);
        }

        (counter, alarms)
    }
}

#[async_trait]
impl Collector for AlarmCollector {
    fn name(&self) -> &'static str {
        "Alarm"
    }

    fn describe(&self) -> Vec<MetricDesc> {
        vec![YELLOW_COUNT, RED_COUNT, ALARM_SET]
    }

    async fn collect(&self, client: &RpcClient, target: &str) -> Result<Vec<Metric>, ConnectError> {
        let commands = if client.is_netconf_enabled() {
            NETCONF_COMMANDS
        } else {
            SHELL_COMMANDS
        };

        let mut replies = Vec::with_capacity(commands.len());
        for command in commands {
            replies.push(client.run_command_and_parse::<AlarmInformation>(command).await?);
        }

        let (counter, alarms) = self.aggregate(replies);

        let mut metrics = vec![
            Metric::new(&YELLOW_COUNT, &[target], f64::from(counter.yellow)),
            Metric::new(&RED_COUNT, &[target], f64::from(counter.red)),
        ];
        metrics.extend(alarms.iter().map(|alarm| {
            Metric::new(
                &ALARM_SET,
                &[
                    target,
                    alarm.class.as_str(),
                    alarm.kind.as_str(),
                    alarm.description.as_str(),
                ],
                1.0,
            )
        }));

        Ok(metrics)
    }
}
