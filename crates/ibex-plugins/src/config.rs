//! Reading and changing configuration at run time.

use ibex_framework::prelude::*;
use serde_json::Value;
use tracing::{info, warn};

use crate::control;

pub fn processor() -> RuleResult<Processor> {
    Processor::builder("config")
        .feature("config")
        .usage("reread config | set config <key> to <value> | get config <key>")
        .rule(
            on_pattern(r"^reread\s+config$")
                .authorise("config")
                .handler(reread),
        )
        .rule(
            on_pattern(r"^set\s+config\s+(\S+?)(?:\s+to\s+|\s*=\s*)(\S.*?)$")
                .authorise("config")
                .handler(set),
        )
        .rule(on_pattern(r"^get\s+config\s+(\S+?)$").handler(get))
        .build()
}

/// Values are JSON when they parse as JSON, plain strings otherwise.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn reread(ctx: Arc<HandlerContext>, _: Captures) -> anyhow::Result<()> {
    match control(&ctx)?.reload_config().await {
        Ok(()) => ctx.add_response("Configuration reread"),
        Err(e) => {
            warn!(error = %e, "Configuration reread failed");
            ctx.add_response("Error reloading configuration");
        }
    }
    Ok(())
}

async fn set(ctx: Arc<HandlerContext>, args: Captures) -> anyhow::Result<()> {
    let key = args.str(0);
    let value = parse_value(args.str(1));
    info!(key = %key, value = %value, sender = %ctx.event().sender, "Setting configuration value");

    match control(&ctx)?.set_config_value(key, value).await {
        Ok(()) => ctx.add_response("Done"),
        Err(e) => {
            warn!(key = %key, error = %e, "Couldn't set configuration value");
            ctx.add_response(format!("Couldn't set {key}"));
        }
    }
    Ok(())
}

async fn get(ctx: Arc<HandlerContext>, args: Captures) -> anyhow::Result<()> {
    match control(&ctx)?.config_value(args.str(0)) {
        Some(value) => ctx.add_response(render_value(&value)),
        None => ctx.add_response("No such option"),
    }
    Ok(())
}
