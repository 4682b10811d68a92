use crate::flow::assembler::Flow;
use crate::flow::state::{CloseType, ConnectionState, InvalidReason};
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregate counts over a set of flows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSummary {
    pub flows: usize,
    pub packets: usize,
    pub bytes: u64,
    pub by_state: BTreeMap<ConnectionState, usize>,
    pub by_close_type: BTreeMap<CloseType, usize>,
    pub by_invalid_reason: BTreeMap<InvalidReason, usize>,
}

impl FlowSummary {
    pub fn from_flows<'a, I>(flows: I) -> Self
    where
        I: IntoIterator<Item = &'a Flow>,
    {
        let mut summary = FlowSummary::default();
        for flow in flows {
            summary.add(flow);
        }
        summary
    }

    pub fn add(&mut self, flow: &Flow) {
        self.flows += 1;
        self.packets += flow.total_packets;
        self.bytes += flow.total_bytes;
        *self.by_state.entry(flow.state).or_default() += 1;
        *self.by_close_type.entry(flow.close_type).or_default() += 1;

        if flow.state == ConnectionState::Invalid {
            let reason = flow.invalid_reason.unwrap_or(InvalidReason::UnknownInvalid);
            *self.by_invalid_reason.entry(reason).or_default() += 1;
        }
    }

    pub fn state_count(&self, state: ConnectionState) -> usize {
        self.by_state.get(&state).copied().unwrap_or(0)
    }

    pub fn close_type_count(&self, close_type: CloseType) -> usize {
        self.by_close_type.get(&close_type).copied().unwrap_or(0)
    }

    pub fn invalid_count(&self, reason: InvalidReason) -> usize {
        self.by_invalid_reason.get(&reason).copied().unwrap_or(0)
    }
}
