//! Feature listing and usage help.

use std::collections::BTreeSet;

use ibex_framework::prelude::*;

use crate::control;

pub fn processor() -> RuleResult<Processor> {
    Processor::builder("help")
        .feature("help")
        .usage("help [<feature>]")
        .rule(on_pattern(r"^help$").handler(features))
        .rule(on_pattern(r"^help\s+(?:me\s+with\s+)?(\S+)$").handler(usage))
        .build()
}

async fn features(ctx: Arc<HandlerContext>, _: Captures) -> anyhow::Result<()> {
    let features: BTreeSet<String> = control(&ctx)?
        .processors()
        .into_iter()
        .filter_map(|info| info.feature)
        .collect();
    let features: Vec<String> = features.into_iter().collect();
    ctx.add_response(format!("I can help you with: {}", features.join(", ")));
    Ok(())
}

async fn usage(ctx: Arc<HandlerContext>, args: Captures) -> anyhow::Result<()> {
    let topic = args.str(0).to_lowercase();
    let usages: Vec<String> = control(&ctx)?
        .processors()
        .into_iter()
        .filter(|info| info.name == topic || info.feature.as_deref() == Some(topic.as_str()))
        .filter_map(|info| info.usage)
        .collect();

    if usages.is_empty() {
        ctx.add_response(format!("I can't help you with {topic}"));
    } else {
        ctx.add_response(format!("Usage: {}", usages.join(" | ")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockControl, run};

    fn control() -> Arc<crate::testing::MockControl> {
        MockControl::with_processors(&[
            ("admin", Some("plugins"), Some("list plugins")),
            ("morse", Some("morse"), Some("morse <text>")),
            ("crypto", Some("crypto"), Some("rot13 <text>")),
            ("quiet", None, None),
        ])
    }

    #[tokio::test]
    async fn test_features_sorted() {
        let replies = run(processor().unwrap(), "help", control()).await;
        assert_eq!(replies, ["I can help you with: crypto, morse, plugins"]);
    }

    #[tokio::test]
    async fn test_usage_by_feature_or_name() {
        assert_eq!(run(processor().unwrap(), "help plugins", control()).await, ["Usage: list plugins"]);
        assert_eq!(run(processor().unwrap(), "help me with Morse", control()).await, ["Usage: morse <text>"]);
        assert_eq!(run(processor().unwrap(), "help quiet", control()).await, ["I can't help you with quiet"]);
    }
}
