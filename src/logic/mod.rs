/// In-process logic nodes
///
/// - conditional: compares two operands
/// - delay: suspends the run
/// - error_handler: records a bookkeeping action
/// - transform: reshapes data from the run context

pub mod conditional;
pub mod delay;
pub mod error_handler;
pub mod transform;
