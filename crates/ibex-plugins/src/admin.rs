//! Loading, unloading and reloading processors and engine components.
//!
//! Every mutating command needs the `plugins` permission, except
//! `reload config`, which needs `config`.

use ibex_framework::prelude::*;
use tracing::warn;

use crate::control;

/// Engine components `reload <component>` understands.
const COMPONENTS: &[&str] = &["reloader", "dispatcher", "auth", "databases"];

pub fn processor() -> RuleResult<Processor> {
    Processor::builder("admin")
        .feature("plugins")
        .usage("list plugins | (load|unload|reload) <name> plugin | reload (config|reloader|dispatcher|auth|databases)")
        .rule(
            on_pattern(r"^reload\s+config$")
                .authorise("config")
                .handler(reload_config),
        )
        .rule(on_pattern(r"^(?:lsmod|list\s+plugins)$").handler(list_plugins))
        .rule(
            on_pattern(r"^(load|unload|reload)\s+(\S+)\s+plugin$")
                .authorise("plugins")
                .handler(manage_plugin),
        )
        .rule(
            on_pattern(r"^reload\s+(reloader|dispatcher|auth|databases)$")
                .authorise("plugins")
                .handler(reload_component),
        )
        .build()
}

async fn reload_config(ctx: Arc<HandlerContext>, _: Captures) -> anyhow::Result<()> {
    match control(&ctx)?.reload_config().await {
        Ok(()) => ctx.add_response("Configuration reloaded"),
        Err(e) => {
            warn!(error = %e, "Configuration reload failed");
            ctx.add_response("Error reloading configuration");
        }
    }
    Ok(())
}

async fn list_plugins(ctx: Arc<HandlerContext>, _: Captures) -> anyhow::Result<()> {
    let mut names: Vec<String> = Vec::new();
    for info in control(&ctx)?.processors() {
        if !names.contains(&info.name) {
            names.push(info.name);
        }
    }
    ctx.add_response(names.join(", "));
    Ok(())
}

async fn manage_plugin(ctx: Arc<HandlerContext>, args: Captures) -> anyhow::Result<()> {
    let action = args.str(0).to_lowercase();
    let name = args.str(1);

    if action == "reload" && COMPONENTS.contains(&name) {
        return reload_component(ctx, Captures::from(vec![Some(name.to_string())])).await;
    }

    let control = control(&ctx)?;
    let (result, done, failed) = match action.as_str() {
        "load" => (control.load_processor(name).await, "Loaded", "Couldn't load"),
        "unload" => (control.unload_processor(name).await, "Unloaded", "Couldn't unload"),
        _ => (control.reload_processor(name).await, "Reloaded", "Couldn't reload"),
    };
    match result {
        Ok(()) => ctx.add_response(format!("{done} {name}")),
        Err(e) => {
            warn!(processor = %name, action = %action, error = %e, "Processor operation failed");
            ctx.add_response(format!("{failed} {name}"));
        }
    }
    Ok(())
}

async fn reload_component(ctx: Arc<HandlerContext>, args: Captures) -> anyhow::Result<()> {
    let component = args.str(0).to_lowercase();
    let control = control(&ctx)?;
    let result = match component.as_str() {
        "reloader" => control.reload_reloader().await,
        "dispatcher" => control.reload_dispatcher().await,
        "auth" => control.reload_auth().await,
        _ => control.reload_databases().await,
    };
    match result {
        Ok(()) => ctx.add_response("Done"),
        Err(e) => {
            warn!(component = %component, error = %e, "Component reload failed");
            ctx.add_response(format!("Couldn't reload {component}"));
        }
    }
    Ok(())
}
