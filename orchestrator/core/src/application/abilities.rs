// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Built-in abilities every runtime registers.
//!
//! - `echo`: returns its params unchanged
//! - `memory_set` / `memory_get` / `memory_delete`: operate on the calling
//!   agent's own memory store
//! - `llm_complete`: one-shot completion through the agent's LLM handle

use anyhow::{anyhow, Context};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::ability::{AbilityContext, AbilityRegistry};

#[derive(Deserialize)]
struct KeyParams {
    key: String,
}

#[derive(Deserialize)]
struct SetParams {
    key: String,
    value: Value,
}

#[derive(Deserialize)]
struct CompleteParams {
    prompt: String,
}

pub fn register_builtin_abilities(registry: &AbilityRegistry) {
    registry.register_fn("echo", |_ctx, params| async move { Ok(params) });
    registry.register_fn("memory_set", memory_set);
    registry.register_fn("memory_get", memory_get);
    registry.register_fn("memory_delete", memory_delete);
    registry.register_fn("llm_complete", llm_complete);
}

async fn memory_set(ctx: AbilityContext, params: Value) -> anyhow::Result<Value> {
    let SetParams { key, value } =
        serde_json::from_value(params).context("memory_set expects {key, value}")?;
    ctx.agent.remember(key.clone(), value);
    Ok(json!({ "stored": key }))
}

async fn memory_get(ctx: AbilityContext, params: Value) -> anyhow::Result<Value> {
    let KeyParams { key } = serde_json::from_value(params).context("memory_get expects {key}")?;
    Ok(ctx.agent.recall(&key).unwrap_or(Value::Null))
}

async fn memory_delete(ctx: AbilityContext, params: Value) -> anyhow::Result<Value> {
    let KeyParams { key } =
        serde_json::from_value(params).context("memory_delete expects {key}")?;
    Ok(ctx.agent.forget(&key).unwrap_or(Value::Null))
}

async fn llm_complete(ctx: AbilityContext, params: Value) -> anyhow::Result<Value> {
    let CompleteParams { prompt } =
        serde_json::from_value(params).context("llm_complete expects {prompt}")?;
    let llm = ctx
        .agent
        .llm()
        .ok_or_else(|| anyhow!("agent {} has no LLM configured", ctx.agent.id()))?;

    let options = ctx.agent.config().llm_config.generation_options();
    let response = llm.complete(&prompt, &options).await?;
    Ok(json!({
        "text": response.text,
        "model": response.model,
    }))
}
