//! Reduced host flavor: a constrained surface over the same protocol.
//!
//! `notify` and CPU accounting do not exist in this host; they are
//! registered as stubs so guests written against the full surface keep
//! binding successfully. The persistent `memory` table is absent
//! entirely, so binding it reports "feature unavailable".

use crate::context::InteropContext;
use crate::host::HostValue;
use crate::registry::TableBuilder;

use super::HostHooks;

/// Register the reduced `game` module surface.
pub fn register(ctx: &mut InteropContext, hooks: &HostHooks) {
    let time = hooks.time.clone();
    let log_lines = hooks.log_lines.clone();

    let table = TableBuilder::new()
        .func("time", move |_args| {
            Ok(HostValue::Number(time.get() as f64))
        })
        .func("log", move |args| match args.first() {
            Some(HostValue::String(s)) => {
                log_lines.borrow_mut().push(s.clone());
                Ok(HostValue::Undefined)
            }
            other => Err(format!("log: expected a string, got {other:?}")),
        })
        // Not available in this host; kept as a no-op stub.
        .func("notify", |_args| Ok(HostValue::Undefined))
        .table(
            "cpu",
            TableBuilder::new()
                .func("getUsed", |_args| Ok(HostValue::Number(0.0)))
                .func("limit", |_args| Ok(HostValue::Number(50.0))),
        )
        .build();
    ctx.register_module("game", table);
}
