use crate::flow::assembler::Flow;
use crate::flow::state::{CloseType, InvalidReason};
use std::collections::BTreeSet;
use std::net::IpAddr;

/// Selects flows by endpoints and outcome. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowFilter {
    ips: Option<(IpAddr, IpAddr)>,
    close_types: BTreeSet<CloseType>,
    invalid_reasons: BTreeSet<InvalidReason>,
}

impl FlowFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep flows between `a` and `b`, in either direction.
    pub fn between(mut self, a: IpAddr, b: IpAddr) -> Self {
        self.ips = Some((a, b));
        self
    }

    pub fn close_types<I: IntoIterator<Item = CloseType>>(mut self, close_types: I) -> Self {
        self.close_types.extend(close_types);
        self
    }

    pub fn invalid_reasons<I: IntoIterator<Item = InvalidReason>>(mut self, reasons: I) -> Self {
        self.invalid_reasons.extend(reasons);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_none() && self.close_types.is_empty() && self.invalid_reasons.is_empty()
    }

    pub fn matches(&self, flow: &Flow) -> bool {
        if let Some((a, b)) = self.ips {
            if !flow.connects(a, b) {
                return false;
            }
        }

        if !self.close_types.is_empty() && !self.close_types.contains(&flow.close_type) {
            return false;
        }

        if !self.invalid_reasons.is_empty() {
            match flow.invalid_reason {
                Some(reason) if self.invalid_reasons.contains(&reason) => {}
                _ => return false,
            }
        }

        true
    }

    pub fn apply(&self, flows: Vec<Flow>) -> Vec<Flow> {
        if self.is_empty() {
            return flows;
        }
        flows.into_iter().filter(|flow| self.matches(flow)).collect()
    }
}
