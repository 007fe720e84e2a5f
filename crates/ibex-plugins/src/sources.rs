//! Connecting, disconnecting and steering sources.

use ibex_framework::prelude::*;
use tracing::warn;

use crate::control;

pub fn processor() -> RuleResult<Processor> {
    Processor::builder("sources")
        .feature("sources")
        .usage("connect to <source> | disconnect from <source> | (join|part) <channel> [on <source>] | list sources")
        .rule(
            on_pattern(r"^connect\s+(?:to\s+)?(\S+)$")
                .authorise("sources")
                .handler(connect),
        )
        .rule(
            on_pattern(r"^disconnect\s+(?:from\s+)?(\S+)$")
                .authorise("sources")
                .handler(disconnect),
        )
        .rule(
            on_pattern(r"^(join|part|leave)\s+(\S+)(?:\s+on\s+(\S+))?$")
                .authorise("sources")
                .handler(channel),
        )
        .rule(on_pattern(r"^(?:list\s+)?sources$").handler(list))
        .build()
}

async fn connect(ctx: Arc<HandlerContext>, args: Captures) -> anyhow::Result<()> {
    let name = args.str(0);
    match control(&ctx)?.connect_source(name).await {
        Ok(()) => ctx.add_response(format!("Connected to {name}")),
        Err(e) => {
            warn!(source = %name, error = %e, "Couldn't connect source");
            ctx.add_response(format!("Couldn't connect to {name}"));
        }
    }
    Ok(())
}

async fn disconnect(ctx: Arc<HandlerContext>, args: Captures) -> anyhow::Result<()> {
    let name = args.str(0);
    match control(&ctx)?.disconnect_source(name).await {
        Ok(()) => ctx.add_response(format!("Disconnected from {name}")),
        Err(e) => {
            warn!(source = %name, error = %e, "Couldn't disconnect source");
            ctx.add_response(format!("Couldn't disconnect from {name}"));
        }
    }
    Ok(())
}

async fn channel(ctx: Arc<HandlerContext>, args: Captures) -> anyhow::Result<()> {
    let joining = args.str(0).eq_ignore_ascii_case("join");
    let channel = args.str(1);
    let name = args.get(2).unwrap_or(ctx.event().source.as_str());

    let Some(source) = control(&ctx)?.source(name) else {
        ctx.add_response(format!("I don't have a source called {name}"));
        return Ok(());
    };
    let result = if joining {
        source.join(channel).await
    } else {
        source.part(channel).await
    };

    let verb = if joining { "join" } else { "part" };
    match result {
        Ok(()) if joining => ctx.add_response(format!("Joining {channel}")),
        Ok(()) => ctx.add_response(format!("Parting {channel}")),
        Err(e) => {
            warn!(source = %name, channel = %channel, error = %e, "Channel operation failed");
            ctx.add_response(format!("Couldn't {verb} {channel}"));
        }
    }
    Ok(())
}

async fn list(ctx: Arc<HandlerContext>, _: Captures) -> anyhow::Result<()> {
    let control = control(&ctx)?;
    let entries: Vec<String> = control
        .source_names()
        .into_iter()
        .map(|name| {
            let state = match control.source(&name) {
                Some(source) if source.is_connected() => "connected",
                _ => "disconnected",
            };
            format!("{name} ({state})")
        })
        .collect();

    if entries.is_empty() {
        ctx.add_response("I have no sources");
    } else {
        ctx.add_response(entries.join(", "));
    }
    Ok(())
}
