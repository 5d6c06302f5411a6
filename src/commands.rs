//! Command execution.

use crate::config::{Config, OutputFormat};
use crate::loader::CatalogError;
use crate::Commands;
use colored::Colorize;
use indexmap::IndexSet;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use stmgr_core::{Action, Catalog, Entity, TransitionGroup, TransitionManager};

/// Everything a command needs.
pub struct Context {
    catalog: Arc<Catalog>,
    manager: TransitionManager,
    format: OutputFormat,
    state_property: String,
}

impl Context {
    pub fn new(catalog: Arc<Catalog>, config: &Config) -> Self {
        let manager = catalog.manager().with_wildcard(config.engine.wildcard());
        Self {
            catalog,
            manager,
            format: config.output.format,
            state_property: config.engine.state_property.clone(),
        }
    }

    fn entity(&self, id: &str) -> Result<&Entity, CatalogError> {
        self.catalog
            .entity(id)
            .ok_or_else(|| CatalogError::UnknownEntity(id.to_string()))
    }

    /// The explicit state if given, else the one stored on the entity.
    fn state<'a>(&self, entity: &'a Entity, explicit: Option<&'a str>) -> Option<&'a str> {
        explicit.or_else(|| entity.state(&self.state_property))
    }
}

/// Executes a command and returns the formatted output.
pub fn execute(ctx: &Context, cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Supported { entity } => {
            let e = ctx.entity(&entity)?;
            let supported = ctx.manager.is_state_management_supported(e)?;
            render(
                ctx.format,
                &json!({ "entity": entity, "supported": supported }),
                || {
                    if supported {
                        format!("{} is state managed", entity.cyan())
                    } else {
                        format!("{} is {}", entity.cyan(), "not state managed".yellow())
                    }
                },
            )
        }

        Commands::NextState {
            entity,
            state,
            operation,
        } => {
            let e = ctx.entity(&entity)?;
            let from = ctx.state(e, state.as_deref());
            let next = ctx.manager.next_state(e, from, operation.as_deref())?;
            render(
                ctx.format,
                &json!({
                    "entity": entity,
                    "state": from,
                    "operation": operation,
                    "next_state": next,
                }),
                || match &next {
                    Some(next) => format!(
                        "{} --{}--> {}",
                        from.unwrap_or("(initial)"),
                        operation.as_deref().unwrap_or("").cyan(),
                        next.yellow()
                    ),
                    None => "No state (entity is not state managed)".yellow().to_string(),
                },
            )
        }

        Commands::RequiredFields {
            entity,
            state,
            operation,
        } => {
            let e = ctx.entity(&entity)?;
            let fields = ctx
                .manager
                .required_fields(e, ctx.state(e, state.as_deref()), &operation)?;
            render(ctx.format, &fields, || {
                format_list(&fields, "No required fields")
            })
        }

        Commands::RequiredFieldsExpression {
            entity,
            state,
            operation,
        } => {
            let e = ctx.entity(&entity)?;
            let expression = ctx.manager.required_fields_expression(
                e,
                ctx.state(e, state.as_deref()),
                &operation,
            )?;
            render(ctx.format, &json!({ "expression": expression }), || {
                match &expression {
                    Some(expr) => expr.clone(),
                    None => "No expression".yellow().to_string(),
                }
            })
        }

        Commands::AllowedOperations { entity, state } => {
            let e = ctx.entity(&entity)?;
            let Some(current) = ctx.state(e, state.as_deref()) else {
                return Err(format!("no current state for {} (use --state)", entity).into());
            };
            let operations = ctx.manager.allowed_operations(e, current)?;
            render(ctx.format, &operations, || {
                format_list(&operations, "No operations allowed")
            })
        }

        Commands::AllowedActions {
            entity,
            state,
            only,
        } => {
            let e = ctx.entity(&entity)?;
            let current = ctx.state(e, state.as_deref());
            let actions = match only {
                Some(ids) => {
                    let restrict: IndexSet<String> = ids.into_iter().collect();
                    ctx.manager
                        .allowed_actions_restricted(e, current, &restrict)?
                }
                None => ctx.manager.allowed_actions(e, current)?,
            };
            render(ctx.format, &actions, || {
                format_actions(&actions, "No actions allowed")
            })
        }

        Commands::AllowedStates { entity } => {
            let e = ctx.entity(&entity)?;
            let states = ctx.manager.allowed_states(e)?;
            render(ctx.format, &states, || format_list(&states, "No states"))
        }

        Commands::ActionGroups { entity } => {
            let e = ctx.entity(&entity)?;
            let groups = ctx.manager.action_groups(Some(e))?;
            render(ctx.format, &groups, || format_groups(&groups))
        }

        Commands::Actions { entity, ids } => {
            // Unknown ids are the manager's concern: it yields nothing.
            let ids: IndexSet<String> = ids.into_iter().collect();
            let actions = ctx.manager.actions(&entity, &ids)?;
            render(ctx.format, &actions, || {
                format_actions(&actions, "No actions")
            })
        }

        Commands::Validate => {
            let report = validate(&ctx.catalog);
            render(ctx.format, &report, || format_report(&report))
        }
    }
}

/// Catalog consistency report.
#[derive(Debug, Serialize)]
struct ValidationReport {
    definitions: usize,
    managed: usize,
    entities: usize,
    providers: usize,
    warnings: Vec<String>,
}

fn validate(catalog: &Catalog) -> ValidationReport {
    let mut warnings = Vec::new();

    for entity in catalog.entities() {
        if catalog.definition(&entity.definition).is_none() {
            warnings.push(format!(
                "entity '{}' references unknown definition '{}'",
                entity.id, entity.definition
            ));
        }
    }

    for spec in catalog.provider_specs() {
        if let Some(definition) = &spec.definition {
            if catalog.definition(definition).is_none() {
                warnings.push(format!(
                    "provider '{}' references unknown definition '{}'",
                    spec.name, definition
                ));
            }
        }
    }

    ValidationReport {
        definitions: catalog.definitions().count(),
        managed: catalog
            .definitions()
            .filter(|d| d.state_transitions().is_some())
            .count(),
        entities: catalog.entities().count(),
        providers: catalog.provider_specs().len(),
        warnings,
    }
}

fn render<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce() -> String,
) -> Result<String, Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Text => Ok(text()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?.trim_end().to_string()),
    }
}

fn format_list(items: &IndexSet<String>, empty: &str) -> String {
    if items.is_empty() {
        return empty.yellow().to_string();
    }
    items
        .iter()
        .map(|item| format!("  {}", item.cyan()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_actions(actions: &IndexSet<Action>, empty: &str) -> String {
    if actions.is_empty() {
        return empty.yellow().to_string();
    }

    let mut output = String::new();
    for action in actions {
        output.push_str(&format!("  {}", action.identifier().cyan()));
        if let Some(label) = action.label() {
            output.push_str(&format!(" - {}", label));
        }
        if let Some(group) = action.group() {
            output.push_str(&format!(" [{}]", group.dimmed()));
        }
        output.push('\n');
    }
    output.trim_end().to_string()
}

fn format_groups(groups: &[TransitionGroup]) -> String {
    if groups.is_empty() {
        return "No action groups".yellow().to_string();
    }

    let mut output = String::new();
    for group in groups {
        output.push_str(&format!("  {}", group.identifier.cyan()));
        if let Some(label) = &group.label {
            output.push_str(&format!(" - {}", label));
        }
        if let Some(parent) = &group.parent {
            output.push_str(&format!(" (parent: {})", parent));
        }
        output.push('\n');
    }
    output.trim_end().to_string()
}

fn format_report(report: &ValidationReport) -> String {
    let mut output = format!(
        "{} {} definitions ({} managed), {} entities, {} providers",
        "Catalog OK:".green(),
        report.definitions,
        report.managed,
        report.entities,
        report.providers
    );
    for warning in &report.warnings {
        output.push_str(&format!("\n  {}: {}", "Warning".yellow(), warning));
    }
    output
}
