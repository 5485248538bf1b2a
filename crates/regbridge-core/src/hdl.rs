//! Hardware-description hooks
//!
//! The FPGA half of the bridge is emitted from Verilog templates that live
//! outside this crate. The bus interface only knows which templates it needs
//! and which numbers to substitute; rendering is up to the caller.

use anyhow::Context;

use crate::config::DerivedTiming;
use crate::error::Result;

/// Top-level signals the bridge adds to the user's design
pub const TOP_LEVEL_PORTS: [&str; 2] = ["input wire rx", "output reg tx"];

/// Placeholder in the instantiation templates replaced by the clock divider
pub const CLOCKS_PER_BAUD_PLACEHOLDER: &str = "/* CLOCKS_PER_BAUD */";

const RX_UART: &str = "uart/rx_uart.v";
const BRIDGE_RX: &str = "uart/bridge_rx.v";
const BRIDGE_TX: &str = "uart/bridge_tx.v";
const UART_TX: &str = "uart/uart_tx.v";
const RX_INST: &str = "uart/uart_rx_bridge_rx_inst_templ.v";
const TX_INST: &str = "uart/uart_tx_bridge_tx_inst_templ.v";

/// Source of rendered hardware-description text
pub trait HdlTemplates {
    /// Render the named template, replacing each placeholder with its value.
    fn render(&self, template: &str, substitutions: &[(&str, String)]) -> anyhow::Result<String>;
}

fn render(templates: &impl HdlTemplates, name: &str, subs: &[(&str, String)]) -> Result<String> {
    Ok(templates
        .render(name, subs)
        .with_context(|| format!("rendering HDL template '{name}'"))?)
}

fn render_pair(templates: &impl HdlTemplates, first: &str, second: &str) -> Result<String> {
    let first = render(templates, first, &[])?;
    let second = render(templates, second, &[])?;
    Ok(format!("{first}\n{second}"))
}

fn clock_substitution(timing: &DerivedTiming) -> [(&'static str, String); 1] {
    [(CLOCKS_PER_BAUD_PLACEHOLDER, timing.clocks_per_baud.to_string())]
}

/// UART receiver followed by the receive-side bridge
pub fn rx_definitions(templates: &impl HdlTemplates) -> Result<String> {
    render_pair(templates, RX_UART, BRIDGE_RX)
}

/// Transmit-side bridge followed by the UART transmitter
pub fn tx_definitions(templates: &impl HdlTemplates) -> Result<String> {
    render_pair(templates, BRIDGE_TX, UART_TX)
}

/// Receive path instantiation
pub fn rx_instance(templates: &impl HdlTemplates, timing: &DerivedTiming) -> Result<String> {
    render(templates, RX_INST, &clock_substitution(timing))
}

/// Transmit path instantiation
pub fn tx_instance(templates: &impl HdlTemplates, timing: &DerivedTiming) -> Result<String> {
    render(templates, TX_INST, &clock_substitution(timing))
}
