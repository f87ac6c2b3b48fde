use imob_mcu::GattServer;
use imob_proto::Attribute;
use log::*;

/// Push a characteristic value to the GATT server. Failures are logged and
/// otherwise ignored: the firmware state is authoritative, the attribute is a view.
pub(crate) fn publish<G: GattServer>(gatt: &mut G, attribute: Attribute, value: &[u8]) {
    if let Err(e) = gatt.write(attribute, value) {
        warn!("Failed to publish {}: {:?}", attribute, e);
    }
}

pub(crate) fn publish_flag<G: GattServer>(gatt: &mut G, attribute: Attribute, value: bool) {
    publish(gatt, attribute, &[u8::from(value)]);
}
