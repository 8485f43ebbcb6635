// The seam to the outside world: the compiler never drives a robot, it only
// emits capability calls in plan order.

use crate::operation::{Channel, Operation};
use crate::plan::Plan;
use crate::well::WellRef;
use serde::{Deserialize, Serialize};

/// The primitive set an execution or simulation engine exposes. The plan is
/// consumed read-only, one operation at a time, in order.
pub trait LiquidHandler {
    fn acquire_tip(&mut self, channel: Channel);
    fn release_tip(&mut self, channel: Channel);
    fn aspirate(&mut self, volume_ul: f64, well: WellRef, rate_ul_s: f64);
    fn dispense(&mut self, volume_ul: f64, well: WellRef, rate_ul_s: f64);
    fn mix(&mut self, repetitions: u32, volume_ul: f64, well: WellRef);
    fn blow_out(&mut self, well: WellRef);
}

/// Feeds a frozen plan to a handler in execution order.
pub fn replay(plan: &Plan, handler: &mut dyn LiquidHandler) {
    for op in plan.operations() {
        match op {
            Operation::Aspirate {
                volume_ul,
                from,
                rate_ul_s,
            } => handler.aspirate(*volume_ul, *from, *rate_ul_s),
            Operation::Dispense {
                volume_ul,
                to,
                rate_ul_s,
            } => handler.dispense(*volume_ul, *to, *rate_ul_s),
            Operation::Mix {
                repetitions,
                volume_ul,
                at,
            } => handler.mix(*repetitions, *volume_ul, *at),
            Operation::BlowOut { at } => handler.blow_out(*at),
            Operation::AcquireTip { channel } => handler.acquire_tip(*channel),
            Operation::ReleaseTip { channel } => handler.release_tip(*channel),
        }
    }
}

/// Simulation handler that renders the human-readable command transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandLog {
    lines: Vec<String>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl LiquidHandler for CommandLog {
    fn acquire_tip(&mut self, channel: Channel) {
        self.lines
            .push(Operation::AcquireTip { channel }.to_string());
    }

    fn release_tip(&mut self, channel: Channel) {
        self.lines
            .push(Operation::ReleaseTip { channel }.to_string());
    }

    fn aspirate(&mut self, volume_ul: f64, well: WellRef, rate_ul_s: f64) {
        self.lines.push(
            Operation::Aspirate {
                volume_ul,
                from: well,
                rate_ul_s,
            }
            .to_string(),
        );
    }

    fn dispense(&mut self, volume_ul: f64, well: WellRef, rate_ul_s: f64) {
        self.lines.push(
            Operation::Dispense {
                volume_ul,
                to: well,
                rate_ul_s,
            }
            .to_string(),
        );
    }

    fn mix(&mut self, repetitions: u32, volume_ul: f64, well: WellRef) {
        self.lines.push(
            Operation::Mix {
                repetitions,
                volume_ul,
                at: well,
            }
            .to_string(),
        );
    }

    fn blow_out(&mut self, well: WellRef) {
        self.lines.push(Operation::BlowOut { at: well }.to_string());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    pub protocol_version: String,
    pub supported_operations: Vec<String>,
    pub deterministic_plan_order: bool,
}

pub fn capabilities() -> Capabilities {
    Capabilities {
        protocol_version: "v1".to_string(),
        supported_operations: vec![
            "Aspirate".to_string(),
            "Dispense".to_string(),
            "Mix".to_string(),
            "BlowOut".to_string(),
            "AcquireTip".to_string(),
            "ReleaseTip".to_string(),
        ],
        deterministic_plan_order: true,
    }
}
