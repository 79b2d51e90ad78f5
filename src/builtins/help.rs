//! builtins::help
//!
//! Discovery over the session's registry: an overview grouped by category,
//! details for one command, or a search.

use crate::core::output::{CommandOutput, ErrorData, KeyValuePair, ListStyle};
use crate::core::value::Value;
use crate::engine::command::{CommandDefinition, DefinitionError};
use crate::engine::registry::CommandRegistry;

pub fn help() -> Result<CommandDefinition, DefinitionError> {
    CommandDefinition::builder("help")
        .aliases(["helpx", "?"])
        .description("Show available commands or details of one command")
        .usage("help [command] [--search <query>]")
        .category("basic")
        .string_param("topic", "Command to describe")
        .string_flag("search", "Search names, descriptions and tags", Some("s"), None)
        .example("List every command", "help", None)
        .example("Describe lsx", "help lsx", None)
        .example("Find file commands", "help --search file", None)
        .on_execute(|plan, ctx| {
            let registry = ctx.context().commands.clone();
            let step = plan.steps.first();
            let query = step
                .and_then(|s| s.param("search"))
                .map(Value::to_string)
                .filter(|q| !q.is_empty());
            let topic = step
                .and_then(|s| s.param("topic"))
                .map(Value::to_string)
                .filter(|t| !t.is_empty());

            let output = match (query, topic) {
                (Some(query), _) => search_results(&registry, &query),
                (None, Some(topic)) => match registry.get(&topic) {
                    Some(def) => details(def),
                    None => CommandOutput::error_with(
                        ErrorData::new(format!("Unknown command: {}", topic))
                            .with_suggestions(registry.suggest(&topic)),
                    ),
                },
                (None, None) => overview(&registry),
            };
            Box::pin(async move { Ok(output) })
        })
        .build()
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|h| h.to_string()).collect()
}

fn summary_row(def: &CommandDefinition) -> Vec<Value> {
    vec![
        Value::from(def.name.as_str()),
        Value::from(def.aliases.join(", ")),
        Value::from(def.description.as_str()),
    ]
}

fn overview(registry: &CommandRegistry) -> CommandOutput {
    let mut sections: Vec<CommandOutput> = registry
        .categories()
        .into_iter()
        .map(|category| {
            let rows = registry.by_category(&category).into_iter().map(summary_row).collect();
            CommandOutput::table(headers(&["Command", "Aliases", "Description"]), rows)
                .with_title(format!("[{}]", category))
        })
        .collect();
    sections.push(CommandOutput::info(
        "Use 'help <command>' for details, ':mode <name>' to switch presentation",
    ));
    CommandOutput::composite(sections).with_title(format!("Commands ({})", registry.len()))
}

fn details(def: &CommandDefinition) -> CommandOutput {
    let mut sections = vec![CommandOutput::key_value(vec![
        KeyValuePair::new("Description", def.description.as_str()),
        KeyValuePair::new("Usage", def.usage.as_str()),
        KeyValuePair::new("Category", def.category_or_default()),
        KeyValuePair::new("Aliases", def.aliases.clone()),
        KeyValuePair::new("Tags", def.tags.clone()),
    ])
    .with_title(format!("Command: {}", def.name))];

    if !def.parameters.is_empty() {
        let rows = def
            .parameters
            .iter()
            .map(|p| {
                vec![
                    Value::from(p.name.as_str()),
                    Value::from(p.kind.as_str()),
                    Value::from(if p.required { "yes" } else { "no" }),
                    p.default.clone().unwrap_or(Value::Null),
                    Value::from(p.description.as_str()),
                ]
            })
            .collect();
        sections.push(
            CommandOutput::table(headers(&["Parameter", "Type", "Required", "Default", "Description"]), rows)
                .with_title("Parameters"),
        );
    }

    if !def.flags.is_empty() {
        let rows = def
            .flags
            .iter()
            .map(|f| {
                let spelled = match &f.short {
                    Some(short) => format!("--{}, -{}", f.name, short),
                    None => format!("--{}", f.name),
                };
                vec![
                    Value::from(spelled),
                    Value::from(f.kind.as_str()),
                    f.default.clone().unwrap_or(Value::Null),
                    Value::from(f.description.as_str()),
                ]
            })
            .collect();
        sections.push(
            CommandOutput::table(headers(&["Flag", "Type", "Default", "Description"]), rows)
                .with_title("Flags"),
        );
    }

    if !def.examples.is_empty() {
        let items: Vec<String> = def
            .examples
            .iter()
            .map(|e| format!("{}  # {}", e.command, e.description))
            .collect();
        sections.push(CommandOutput::list_with(items, false, ListStyle::Arrow).with_title("Examples"));
    }

    CommandOutput::composite(sections)
}

fn search_results(registry: &CommandRegistry, query: &str) -> CommandOutput {
    let hits = registry.search(query);
    if hits.is_empty() {
        return CommandOutput::info(format!("No commands match '{}'", query));
    }
    let count = hits.len();
    let rows = hits.into_iter().map(summary_row).collect();
    CommandOutput::table(headers(&["Command", "Aliases", "Description"]), rows)
        .with_title(format!("Commands matching '{}' ({})", query, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::builtins::register_builtins;
    use crate::core::output::OutputBody;
    use crate::engine::runner::Pipeline;
    use crate::engine::CommandContext;
    use crate::ui::present::{PresentationConfig, Presenter};

    async fn run(line: &str) -> CommandOutput {
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry).unwrap();
        let def = registry.get("help").unwrap().clone();
        let ctx = CommandContext::new("/").with_commands(Arc::new(registry));
        let mut out = Vec::new();
        Pipeline::new()
            .run(line, &def, &ctx, &Presenter::new(PresentationConfig::plain()), &mut out)
            .await
            .unwrap()
            .output
    }

    fn titles(output: &CommandOutput) -> Vec<String> {
        output
            .children
            .iter()
            .filter_map(|c| c.metadata.as_ref().and_then(|m| m.title.clone()))
            .collect()
    }

    mod overview {
        use super::*;

        #[tokio::test]
        async fn groups_by_category() {
            let output = run("help").await;
            assert!(output.is_composite());
            let titles = titles(&output);
            assert_eq!(titles, vec!["[basic]", "[filesystem]", "[system]"]);
            match &output.children[1].body {
                OutputBody::Table(table) => {
                    let names: Vec<String> = table.rows.iter().map(|r| r[0].to_string()).collect();
                    assert!(names.contains(&"lsx".to_string()));
                    assert!(names.contains(&"cd".to_string()));
                }
                other => panic!("expected table, got {:?}", other),
            }
        }
    }

    mod topic {
        use super::*;

        #[tokio::test]
        async fn describes_parameters_and_flags() {
            let output = run("helpx lsx").await;
            assert_eq!(titles(&output), vec!["Command: lsx", "Parameters", "Flags", "Examples"]);
            match &output.children[2].body {
                OutputBody::Table(table) => {
                    assert_eq!(table.rows[0][0], Value::from("--tree, -t"));
                    assert_eq!(table.rows[0][2], Value::Bool(false));
                }
                other => panic!("expected table, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn alias_resolves() {
            let output = run("help dir").await;
            assert_eq!(titles(&output)[0], "Command: lsx");
        }

        #[tokio::test]
        async fn unknown_topic_suggests() {
            let output = run("help ls").await;
            match &output.body {
                OutputBody::Error(error) => {
                    assert_eq!(error.message, "Unknown command: ls");
                    assert!(error.suggestions.contains(&"lsx".to_string()));
                }
                other => panic!("expected error, got {:?}", other),
            }
        }
    }

    mod search {
        use super::*;

        #[tokio::test]
        async fn matches_tags() {
            let output = run("help --search grep").await;
            match &output.body {
                OutputBody::Table(table) => {
                    assert_eq!(table.rows.len(), 1);
                    assert_eq!(table.rows[0][0], Value::from("search"));
                }
                other => panic!("expected table, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn no_hits_is_info() {
            let output = run("help -s zzz").await;
            assert_eq!(output.tag(), "info");
        }
    }
}
