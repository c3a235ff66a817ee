//! # Sterling EPOS Terminal Entry Point
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load `epos.toml` and environment overrides
//! 3. Build the payment gateway and receipt printer
//! 4. Read operator commands until `quit` or end of input
//!
//! The actual setup is in lib.rs so it can be tested.

fn main() {
    epos_terminal::run();
}
