pub mod gate;

pub use gate::ProtectionGate;
