use anyhow::Context;
use std::path::PathBuf;

use centseek_core::{
    categorize::assess, features::assemble, importance::top_features, indicators,
    model::Scorer, schema::RawCustomerInput, xgb_runtime::XgbRuntime,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    // 1) artifact path: first argument, default centseek_model.json
    let model_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("centseek_model.json"));

    // 2) load
    let rt = XgbRuntime::load_from_path(&model_path)
        .with_context(|| format!("smoke load {}", model_path.display()))?;
    println!(
        "model={} trees={} features={}",
        rt.model_path.display(),
        rt.num_trees(),
        rt.schema().len()
    );

    // 3) one on-time customer and one chronically late one
    let samples = [
        (
            "on_time",
            RawCustomerInput {
                credit_limit: 5000.0,
                delays: [0; 7],
                bill_amounts: [200.0; 6],
                payment_amounts: [200.0; 6],
            },
        ),
        (
            "chronic_delay",
            RawCustomerInput {
                credit_limit: 5000.0,
                delays: [9; 7],
                bill_amounts: [4800.0; 6],
                payment_amounts: [0.0; 6],
            },
        ),
    ];

    // 4) assemble + score + categorize
    for (name, raw) in &samples {
        let fv = assemble(rt.schema(), raw)?;
        let p = rt.score(&fv)?;
        let a = assess(p)?;
        let s = indicators::compute(raw);
        println!(
            "{name:<14} p={p:.6} category={:?} ratio={:?}",
            a.category(),
            s.bill_to_payment_ratio
        );
    }

    // 5) global importance
    println!("top_features:");
    for e in top_features(&rt, 10).entries {
        println!("  {:<24} {:>10.6}", e.feature, e.weight);
    }

    Ok(())
}
