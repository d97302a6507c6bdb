use crate::http_stage::HttpTransport;
use crate::mqtt_stage::MqttLink;
use crate::sensors::SensorProvider;

/// Radio attachment as observed by the network stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// Not associated with an access point.
    Detached,
    /// Associating or waiting for an address.
    Associating,
    /// An IP address is held; transmission may begin.
    AddressHeld,
}

/// Seam for the radio attach status poll.
pub trait NetworkStatus {
    fn attachment(&mut self) -> Attachment;
}

/// Discrete status-indicator signals set at phase boundaries. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSignal {
    Off,
    /// Cycle started.
    Flash1,
    /// Transmitting.
    Flash2,
    /// Backoff after a failed attempt.
    Flash3,
    /// First-boot reconfigure hold.
    Flash4,
}

/// Seam for the status LED.
pub trait StatusIndicator {
    fn set(&mut self, signal: StatusSignal);
}

/// Seam for power control. `sleep` halts execution until an external wake
/// source re-enters the cycle.
pub trait PowerControl {
    fn sleep(&mut self, seconds: u32);
}

/// External collaborators the sequencer drives. Bundled so a cycle can be
/// assembled from independent adapters in tests and in the binary alike.
pub struct NodePorts {
    pub sensors: Box<dyn SensorProvider>,
    pub network: Box<dyn NetworkStatus>,
    pub http: Box<dyn HttpTransport>,
    pub mqtt: Box<dyn MqttLink>,
    pub status: Box<dyn StatusIndicator>,
    pub power: Box<dyn PowerControl>,
}
