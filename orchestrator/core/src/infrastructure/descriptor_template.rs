// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Descriptor Template Engine
//!
//! Renders the workload descriptor template with Handlebars.
//!
//! # Supported Placeholders
//!
//! - `{{account_id}}` - account resolved by the identity step
//! - `{{region}}` - target region
//! - `{{project}}` - project prefix
//!
//! Strict mode is on: an unknown placeholder is an error, never an empty
//! string baked into a registered definition. Output is not HTML-escaped.

use anyhow::{Context, Result};
use handlebars::Handlebars;
use std::collections::BTreeMap;

use crate::domain::stack_config::WorkloadTemplate;
use crate::domain::workload::{DescriptorContext, DescriptorRenderer, SecretBinding, WorkloadDefinition};

pub struct DescriptorTemplateEngine {
    handlebars: Handlebars<'static>,
}

impl DescriptorTemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    pub fn render(&self, template: &str, context: &DescriptorContext) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .with_context(|| format!("Failed to render descriptor template '{}'", template))
    }

    /// Check syntax and placeholders without a live account
    pub fn validate_workload(&self, template: &WorkloadTemplate) -> Result<()> {
        self.render_workload(
            template,
            &DescriptorContext::placeholder(),
            "validation",
            "validation",
            Vec::new(),
        )
        .map(|_| ())
    }
}

impl DescriptorRenderer for DescriptorTemplateEngine {
    fn render_workload(
        &self,
        template: &WorkloadTemplate,
        context: &DescriptorContext,
        family: &str,
        log_sink: &str,
        secrets: Vec<SecretBinding>,
    ) -> Result<WorkloadDefinition> {
        let environment = template
            .environment
            .iter()
            .map(|(key, value)| {
                self.render(value, context)
                    .with_context(|| format!("environment variable {}", key))
                    .map(|rendered| (key.clone(), rendered))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(WorkloadDefinition {
            family: family.to_string(),
            container_name: template.container_name.clone(),
            image: self.render(&template.image, context).context("workload image")?,
            cpu_units: template.cpu_units,
            memory_mb: template.memory_mb,
            port: template.port,
            environment,
            secrets,
            log_sink: log_sink.to_string(),
            region: context.region.clone(),
        })
    }
}

impl Default for DescriptorTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
