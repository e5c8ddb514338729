// Domain layer: the Loki result model, connector rows and the ports the
// connector is written against.

pub mod model;
pub mod ports;
pub mod record;
