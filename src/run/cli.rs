use anyhow::{Context, Result};

use crate::business::BusinessRegistry;
use crate::category::CategoryManager;
use crate::context::RequestContext;
use crate::models::{ServiceCategory, ServiceCategoryWithStatistics};
use crate::template::TemplateRegistry;

/// Flags that consume the following argument.
const VALUE_FLAGS: &[&str] = &["--biz", "--parent", "--category"];

pub(crate) struct Services {
    pub categories: CategoryManager,
    pub businesses: BusinessRegistry,
    pub templates: TemplateRegistry,
}

pub(crate) fn as_cli(args: &[String], services: &Services, ctx: &RequestContext) -> Result<()> {
    let Some(command) = args.get(1) else {
        print_usage();
        return Ok(());
    };
    let rest = &args[2..];
    match command.as_str() {
        "business" => cli_business(rest, services, ctx),
        "businesses" => cli_businesses(services, ctx),
        "create" => cli_create(rest, services, ctx),
        "get" => cli_get(rest, services, ctx),
        "rename" => cli_rename(rest, services, ctx),
        "list" | "ls" => cli_list(rest, services, ctx),
        "delete" | "rm" => cli_delete(rest, services, ctx),
        "template" => cli_template(rest, services, ctx),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("svccat {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("svccat - service category hierarchy manager");
    println!();
    println!("Usage: svccat <command>");
    println!();
    println!("Commands:");
    println!("  business add <id> <name>          Register a business (seeds built-in categories)");
    println!("  businesses                        List registered businesses");
    println!("  create <name> --biz <id>          Create a service category");
    println!("    --parent <id>                   Parent category (default: none, a root)");
    println!("  get <id>                          Show one category");
    println!("    --biz <id>                      Only if it belongs to this business");
    println!("  rename <id> <name>                Rename a category");
    println!("  list --biz <id>                   List categories of a business");
    println!("    --stats                         Include template and child counts");
    println!("  delete <id>                       Delete a leaf, unused category");
    println!("  template add <name> --biz <id> --category <id>");
    println!("                                    Register a service template using a category");
    println!("  template list --category <id>     Templates using a category");
    println!("  --json                            Print records as JSON (get, list)");
    println!("  --help, -h                        Show this help");
    println!("  --version, -V                     Show version");
}

// ── Argument helpers ─────────────────────────────────────────

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Arguments that are neither flags nor flag values.
fn positionals(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip_next = true;
        } else if !arg.starts_with("--") {
            out.push(arg.as_str());
        }
    }
    out
}

fn parse_id(raw: &str, what: &str) -> Result<i64> {
    raw.parse::<i64>()
        .with_context(|| format!("Invalid {what}: {raw}"))
}

fn required_id(args: &[String], flag: &str, what: &str) -> Result<i64> {
    let raw = flag_value(args, flag)
        .ok_or_else(|| anyhow::anyhow!("Missing {flag} <{what}>"))?;
    parse_id(raw, what)
}

// ── Commands ─────────────────────────────────────────────────

fn cli_business(args: &[String], services: &Services, ctx: &RequestContext) -> Result<()> {
    let pos = positionals(args);
    match pos.as_slice() {
        ["add", id, name @ ..] if !name.is_empty() => {
            let id = parse_id(id, "business id")?;
            let business = services.businesses.add_business(ctx, id, &name.join(" "))?;
            println!("Registered business {business}");
            Ok(())
        }
        _ => anyhow::bail!("Usage: svccat business add <id> <name>"),
    }
}

fn cli_businesses(services: &Services, ctx: &RequestContext) -> Result<()> {
    let businesses = services.businesses.list_businesses(ctx)?;
    if businesses.is_empty() {
        println!("No businesses");
        return Ok(());
    }

    println!("{:<8} {:<24} Supplier", "ID", "Name");
    println!("{}", "─".repeat(44));
    for biz in &businesses {
        println!("{:<8} {:<24} {}", biz.id, biz.name, biz.supplier_account);
    }
    Ok(())
}

fn cli_create(args: &[String], services: &Services, ctx: &RequestContext) -> Result<()> {
    let pos = positionals(args);
    if pos.is_empty() {
        anyhow::bail!("Usage: svccat create <name> --biz <id> [--parent <id>]");
    }
    let business_id = required_id(args, "--biz", "business id")?;
    let parent_id = match flag_value(args, "--parent") {
        Some(raw) => parse_id(raw, "parent id")?,
        None => 0,
    };

    let category = services.categories.create_service_category(
        ctx,
        ServiceCategory::new(pos.join(" "), parent_id, business_id),
    )?;
    println!(
        "Created category {} '{}' (root {})",
        category.id, category.name, category.root_id
    );
    Ok(())
}

fn cli_get(args: &[String], services: &Services, ctx: &RequestContext) -> Result<()> {
    let raw = positionals(args)
        .first()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("Usage: svccat get <id> [--biz <id>]"))?;
    let id = parse_id(raw, "category id")?;

    let category = match flag_value(args, "--biz") {
        Some(biz) => {
            let business_id = parse_id(biz, "business id")?;
            services
                .categories
                .get_service_category_in_business(ctx, business_id, id)?
        }
        None => services.categories.get_service_category(ctx, id)?,
    };

    if has_flag(args, "--json") {
        println!("{}", serde_json::to_string_pretty(&category)?);
        return Ok(());
    }
    println!("ID:        {}", category.id);
    println!("Name:      {}", category.name);
    println!("Parent:    {}", category.parent_id);
    println!("Root:      {}", category.root_id);
    println!(
        "Business:  {}",
        category
            .scope
            .business_id()
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".into())
    );
    println!("Built-in:  {}", if category.is_built_in { "yes" } else { "no" });
    println!("Supplier:  {}", category.supplier_account);
    println!("Updated:   {}", category.updated_at);
    Ok(())
}

fn cli_rename(args: &[String], services: &Services, ctx: &RequestContext) -> Result<()> {
    let pos = positionals(args);
    let [id, name @ ..] = pos.as_slice() else {
        anyhow::bail!("Usage: svccat rename <id> <name>");
    };
    if name.is_empty() {
        anyhow::bail!("Usage: svccat rename <id> <name>");
    }
    let id = parse_id(id, "category id")?;
    let mut input = services.categories.get_service_category(ctx, id)?;
    input.name = name.join(" ");
    let updated = services.categories.update_service_category(ctx, id, input)?;
    println!("Renamed category {} to '{}'", updated.id, updated.name);
    Ok(())
}

fn cli_list(args: &[String], services: &Services, ctx: &RequestContext) -> Result<()> {
    let business_id = required_id(args, "--biz", "business id")?;
    let with_statistics = has_flag(args, "--stats");
    let listed = services
        .categories
        .list_service_categories(ctx, business_id, with_statistics)?;

    if has_flag(args, "--json") {
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }
    if listed.info.is_empty() {
        println!("No categories in business {business_id}");
        return Ok(());
    }

    print_tree(&listed.info, with_statistics);
    println!();
    println!("{} categories", listed.count);
    Ok(())
}

/// Indented tree, roots first, children under their parent.
fn print_tree(entries: &[ServiceCategoryWithStatistics], with_statistics: bool) {
    fn walk(
        entries: &[ServiceCategoryWithStatistics],
        parent_id: i64,
        depth: usize,
        with_statistics: bool,
    ) {
        for entry in entries.iter().filter(|e| e.category.parent_id == parent_id) {
            let cat = &entry.category;
            let label = format!("{}{}", "  ".repeat(depth), cat.name);
            let builtin = if cat.is_built_in { " [built-in]" } else { "" };
            if with_statistics {
                println!(
                    "{:<6} {:<32} templates={} children={}{}",
                    cat.id,
                    label,
                    entry.usage_amount.unwrap_or(0),
                    entry.child_amount.unwrap_or(0),
                    builtin
                );
            } else {
                println!("{:<6} {:<32}{}", cat.id, label, builtin);
            }
            walk(entries, cat.id, depth + 1, with_statistics);
        }
    }

    println!("{:<6} Name", "ID");
    println!("{}", "─".repeat(50));
    walk(entries, 0, 0, with_statistics);
}

fn cli_delete(args: &[String], services: &Services, ctx: &RequestContext) -> Result<()> {
    let raw = positionals(args)
        .first()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("Usage: svccat delete <id>"))?;
    let id = parse_id(raw, "category id")?;
    services.categories.delete_service_category(ctx, id)?;
    println!("Deleted category {id}");
    Ok(())
}

fn cli_template(args: &[String], services: &Services, ctx: &RequestContext) -> Result<()> {
    let pos = positionals(args);
    match pos.as_slice() {
        ["add", name @ ..] if !name.is_empty() => {
            let business_id = required_id(args, "--biz", "business id")?;
            let category_id = required_id(args, "--category", "category id")?;
            let template = services.templates.add_service_template(
                ctx,
                business_id,
                &name.join(" "),
                category_id,
            )?;
            println!(
                "Registered template {} '{}' using category {}",
                template.id, template.name, template.service_category_id
            );
            Ok(())
        }
        ["list"] => {
            let category_id = required_id(args, "--category", "category id")?;
            let templates = services.templates.templates_using(ctx, category_id)?;
            if templates.is_empty() {
                println!("No templates use category {category_id}");
            }
            for template in &templates {
                println!("{:<6} {}", template.id, template.name);
            }
            Ok(())
        }
        _ => anyhow::bail!(
            "Usage: svccat template add <name> --biz <id> --category <id> | template list --category <id>"
        ),
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod cli_tests;
