use std::time::Duration;

use crate::PrinterOptions;
use crate::gatt::{Capabilities, CharacteristicInfo};



fn writable(service: uuid::Uuid, id: u16, ack: bool, unacked: bool) -> CharacteristicInfo {
    CharacteristicInfo {
        uuid: crate::gatt::uuid_from_u16(id),
        service,
        capabilities: Capabilities {
            supports_ack: ack,
            supports_unacked: unacked,
        },
    }
}

fn fast_options() -> PrinterOptions {
    PrinterOptions::new()
        .with_inter_frame_delay(Duration::ZERO)
        .with_retry_backoff(Duration::ZERO)
}
