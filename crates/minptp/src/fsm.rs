//! The PTP port state machine as a pure transition function.
//!
//! The port driver stays free of transition logic: it feeds
//! [`ptp_fsm`] (or [`ptp_slave_fsm`] for slave-only clocks) the current
//! state and an event and acts on the returned state. `STATE_DECISION_EVENT`
//! deliberately never changes state here — the clock aggregate answers it
//! with one of the `Rs*` recommendations.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Initializing,
    Faulty,
    Disabled,
    Listening,
    PreMaster,
    Master,
    Passive,
    Uncalibrated,
    Slave,
    GrandMaster,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortState::Initializing => "INITIALIZING",
            PortState::Faulty => "FAULTY",
            PortState::Disabled => "DISABLED",
            PortState::Listening => "LISTENING",
            PortState::PreMaster => "PRE_MASTER",
            PortState::Master => "MASTER",
            PortState::Passive => "PASSIVE",
            PortState::Uncalibrated => "UNCALIBRATED",
            PortState::Slave => "SLAVE",
            PortState::GrandMaster => "GRAND_MASTER",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmEvent {
    None,
    PowerUp,
    Initialize,
    DesignatedEnabled,
    DesignatedDisabled,
    FaultCleared,
    FaultDetected,
    StateDecisionEvent,
    QualificationTimeoutExpires,
    AnnounceReceiptTimeoutExpires,
    SynchronizationFault,
    MasterClockSelected,
    RsMaster,
    RsGrandMaster,
    RsSlave,
    RsPassive,
}

impl fmt::Display for FsmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FsmEvent::None => "NONE",
            FsmEvent::PowerUp => "POWERUP",
            FsmEvent::Initialize => "INITIALIZE",
            FsmEvent::DesignatedEnabled => "DESIGNATED_ENABLED",
            FsmEvent::DesignatedDisabled => "DESIGNATED_DISABLED",
            FsmEvent::FaultCleared => "FAULT_CLEARED",
            FsmEvent::FaultDetected => "FAULT_DETECTED",
            FsmEvent::StateDecisionEvent => "STATE_DECISION_EVENT",
            FsmEvent::QualificationTimeoutExpires => "QUALIFICATION_TIMEOUT_EXPIRES",
            FsmEvent::AnnounceReceiptTimeoutExpires => "ANNOUNCE_RECEIPT_TIMEOUT_EXPIRES",
            FsmEvent::SynchronizationFault => "SYNCHRONIZATION_FAULT",
            FsmEvent::MasterClockSelected => "MASTER_CLOCK_SELECTED",
            FsmEvent::RsMaster => "RS_MASTER",
            FsmEvent::RsGrandMaster => "RS_GRAND_MASTER",
            FsmEvent::RsSlave => "RS_SLAVE",
            FsmEvent::RsPassive => "RS_PASSIVE",
        };
        f.write_str(s)
    }
}

/// Transition function for a full (master-capable) ordinary clock port.
pub fn ptp_fsm(state: PortState, event: FsmEvent) -> PortState {
    use FsmEvent::*;
    use PortState::*;

    if matches!(event, PowerUp | Initialize) {
        return Initializing;
    }

    match state {
        Initializing => match event {
            FaultDetected => Faulty,
            _ => state,
        },
        Faulty => match event {
            DesignatedDisabled => Disabled,
            FaultCleared => Initializing,
            _ => state,
        },
        Disabled => match event {
            DesignatedEnabled => Initializing,
            _ => state,
        },
        Listening => match event {
            DesignatedDisabled => Disabled,
            FaultDetected => Faulty,
            AnnounceReceiptTimeoutExpires => Master,
            RsMaster => PreMaster,
            RsGrandMaster => GrandMaster,
            RsSlave => Uncalibrated,
            RsPassive => Passive,
            _ => state,
        },
        PreMaster => match event {
            DesignatedDisabled => Disabled,
            FaultDetected => Faulty,
            QualificationTimeoutExpires => Master,
            RsGrandMaster => GrandMaster,
            RsSlave => Uncalibrated,
            RsPassive => Passive,
            _ => state,
        },
        Master => match event {
            DesignatedDisabled => Disabled,
            FaultDetected => Faulty,
            RsGrandMaster => GrandMaster,
            RsSlave => Uncalibrated,
            RsPassive => Passive,
            _ => state,
        },
        GrandMaster => match event {
            DesignatedDisabled => Disabled,
            FaultDetected => Faulty,
            RsMaster => PreMaster,
            RsSlave => Uncalibrated,
            RsPassive => Passive,
            _ => state,
        },
        Passive => match event {
            DesignatedDisabled => Disabled,
            FaultDetected => Faulty,
            AnnounceReceiptTimeoutExpires => Master,
            RsMaster => PreMaster,
            RsGrandMaster => GrandMaster,
            RsSlave => Uncalibrated,
            _ => state,
        },
        Uncalibrated => match event {
            DesignatedDisabled => Disabled,
            FaultDetected => Faulty,
            AnnounceReceiptTimeoutExpires => Master,
            MasterClockSelected => Slave,
            RsMaster => PreMaster,
            RsGrandMaster => GrandMaster,
            RsPassive => Passive,
            _ => state,
        },
        Slave => match event {
            DesignatedDisabled => Disabled,
            FaultDetected => Faulty,
            AnnounceReceiptTimeoutExpires => Master,
            SynchronizationFault => Uncalibrated,
            RsMaster => PreMaster,
            RsGrandMaster => GrandMaster,
            RsPassive => Passive,
            _ => state,
        },
    }
}

/// Transition function for a slave-only clock: every path that would lead to
/// a master role lands in `LISTENING` or `PASSIVE` instead.
pub fn ptp_slave_fsm(state: PortState, event: FsmEvent) -> PortState {
    use FsmEvent::*;
    use PortState::*;

    if matches!(event, PowerUp | Initialize) {
        return Initializing;
    }

    match state {
        Initializing => match event {
            FaultDetected => Faulty,
            _ => state,
        },
        Faulty => match event {
            DesignatedDisabled => Disabled,
            FaultCleared => Initializing,
            _ => state,
        },
        Disabled => match event {
            DesignatedEnabled => Initializing,
            _ => state,
        },
        Listening => match event {
            DesignatedDisabled => Disabled,
            FaultDetected => Faulty,
            RsMaster | RsGrandMaster | RsPassive => Passive,
            RsSlave => Uncalibrated,
            _ => state,
        },
        Passive => match event {
            DesignatedDisabled => Disabled,
            FaultDetected => Faulty,
            AnnounceReceiptTimeoutExpires => Listening,
            RsSlave => Uncalibrated,
            _ => state,
        },
        Uncalibrated => match event {
            DesignatedDisabled => Disabled,
            FaultDetected => Faulty,
            AnnounceReceiptTimeoutExpires => Listening,
            MasterClockSelected => Slave,
            RsMaster | RsGrandMaster | RsPassive => Passive,
            _ => state,
        },
        Slave => match event {
            DesignatedDisabled => Disabled,
            FaultDetected => Faulty,
            AnnounceReceiptTimeoutExpires => Listening,
            SynchronizationFault => Uncalibrated,
            RsMaster | RsGrandMaster | RsPassive => Passive,
            _ => state,
        },
        // A slave-only clock never enters the master-side states; treat them
        // like LISTENING if it somehow does.
        PreMaster | Master | GrandMaster => match event {
            DesignatedDisabled => Disabled,
            FaultDetected => Faulty,
            _ => Listening,
        },
    }
}
