//! Item commands: add, list, show, update, delete, search.

use anyhow::Context as _;
use clap::{Args, ValueEnum};
use console::style;
use vaultkeep_core::{
    CardFields, HashField, IdentityFields, ItemCategory, ItemDetails, LoginFields, NewItem,
    SecretString, VaultItem,
};
use vaultkeep_sync::{FetchOptions, MutationOutcome, VaultEntry, VaultSession};

use crate::context::Context;
use crate::render;

/// Add command arguments.
#[derive(Args)]
pub struct AddArgs {
    /// Item name
    pub name: String,

    /// Item category (login, note, card, identity)
    #[arg(long, default_value = "login")]
    pub category: ItemCategory,

    #[arg(long)]
    pub notes: Option<String>,

    /// Tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    #[arg(long)]
    pub favorite: bool,

    /// Login username
    #[arg(long)]
    pub username: Option<String>,

    /// Login URL
    #[arg(long)]
    pub url: Option<String>,

    /// Login password (prefer --ask-password)
    #[arg(long)]
    pub password: Option<String>,

    /// Prompt for the login password
    #[arg(long, conflicts_with = "password")]
    pub ask_password: bool,

    #[arg(long)]
    pub cardholder: Option<String>,

    /// Card number
    #[arg(long)]
    pub number: Option<String>,

    #[arg(long)]
    pub cvv: Option<String>,

    /// Card expiry, e.g. 08/27
    #[arg(long)]
    pub expiry: Option<String>,

    #[arg(long)]
    pub first_name: Option<String>,

    #[arg(long)]
    pub last_name: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub company: Option<String>,
}

/// List command arguments.
#[derive(Args)]
pub struct ListArgs {
    /// Only show this category
    #[arg(long)]
    pub category: Option<ItemCategory>,

    /// Only show favorites
    #[arg(long)]
    pub favorites: bool,

    /// Print JSON
    #[arg(long)]
    pub json: bool,
}

/// Show command arguments.
#[derive(Args)]
pub struct ShowArgs {
    /// Item id or name
    pub item: String,

    /// Print secrets in clear text
    #[arg(long)]
    pub reveal: bool,
}

/// Update command arguments.
#[derive(Args)]
pub struct UpdateArgs {
    /// Item id or name
    pub item: String,

    /// New name
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,

    #[arg(long)]
    pub favorite: Option<bool>,

    /// Add a tag (repeatable)
    #[arg(long = "add-tag")]
    pub add_tags: Vec<String>,

    /// Remove a tag (repeatable)
    #[arg(long = "remove-tag")]
    pub remove_tags: Vec<String>,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    /// Prompt for a new login password
    #[arg(long, conflicts_with = "password")]
    pub ask_password: bool,
}

/// Delete command arguments.
#[derive(Args)]
pub struct DeleteArgs {
    /// Item id or name
    pub item: String,
}

/// Fields with an exact-match lookup.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExactField {
    Name,
    Url,
    Username,
}

impl From<ExactField> for HashField {
    fn from(field: ExactField) -> Self {
        match field {
            ExactField::Name => HashField::Name,
            ExactField::Url => HashField::Url,
            ExactField::Username => HashField::Username,
        }
    }
}

/// Search command arguments.
#[derive(Args)]
pub struct SearchArgs {
    /// Text to look for
    pub query: String,

    /// Match one field exactly (case-insensitive) using the store's search hashes
    #[arg(long, value_enum)]
    pub exact: Option<ExactField>,
}

pub async fn add(ctx: &Context, args: AddArgs) -> anyhow::Result<()> {
    let password = match (&args.password, args.ask_password) {
        (Some(password), _) => Some(password.clone()),
        (None, true) => Some(
            rpassword::prompt_password("Item password: ")
                .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))?,
        ),
        (None, false) => None,
    };
    let new = new_item(&args, password)?;

    let session = ctx.unlock().await?;
    let id = session.engine().add(new).await?;
    println!("{} Added '{}' ({})", style("✓").green(), args.name, id);
    session.lock();
    Ok(())
}

pub async fn list(ctx: &Context, args: ListArgs) -> anyhow::Result<()> {
    let session = ctx.unlock().await?;
    let entries: Vec<VaultEntry> = session
        .engine()
        .get_all(FetchOptions::cached())
        .await?
        .into_iter()
        .filter(|entry| match entry.item() {
            Some(item) => {
                args.category.map_or(true, |c| item.category() == c)
                    && (!args.favorites || item.favorite)
            }
            None => args.category.is_none() && !args.favorites,
        })
        .collect();

    if args.json {
        // Summaries only; `show --reveal` and `export` are the ways to get secrets out
        let items: Vec<serde_json::Value> = entries
            .iter()
            .filter_map(VaultEntry::item)
            .map(|item| {
                serde_json::json!({
                    "id": item.id,
                    "name": item.name,
                    "category": item.category(),
                    "favorite": item.favorite,
                    "tags": item.tags,
                    "last_modified": item.last_modified,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        render::render_table(&entries);
    }
    session.lock();
    Ok(())
}

pub async fn show(ctx: &Context, args: ShowArgs) -> anyhow::Result<()> {
    let session = ctx.unlock().await?;
    let item = resolve(&session, &args.item)?;
    render::render_item(&item, args.reveal);
    session.lock();
    Ok(())
}

pub async fn update(ctx: &Context, args: UpdateArgs) -> anyhow::Result<()> {
    let password = match (&args.password, args.ask_password) {
        (Some(password), _) => Some(password.clone()),
        (None, true) => Some(
            rpassword::prompt_password("New item password: ")
                .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))?,
        ),
        (None, false) => None,
    };

    let session = ctx.unlock().await?;
    let mut item = resolve(&session, &args.item)?;
    apply_changes(&mut item, &args, password)?;

    let name = item.name.clone();
    match session.engine().update(item).await? {
        MutationOutcome::Applied => println!("{} Updated '{}'", style("✓").green(), name),
        MutationOutcome::RemovedRemotely => {
            println!("{} '{}' was deleted elsewhere; nothing to update", style("!").yellow(), name)
        }
    }
    session.lock();
    Ok(())
}

pub async fn delete(ctx: &Context, args: DeleteArgs) -> anyhow::Result<()> {
    let session = ctx.unlock().await?;
    let item = resolve(&session, &args.item)?;
    session.engine().delete(&item.id).await?;
    println!("{} Deleted '{}'", style("✓").green(), item.name);
    session.lock();
    Ok(())
}

pub async fn search(ctx: &Context, args: SearchArgs) -> anyhow::Result<()> {
    let session = ctx.unlock().await?;
    let items = match args.exact {
        Some(field) => session.engine().find_exact(field.into(), &args.query).await?,
        None => session.engine().search(&args.query),
    };

    let entries: Vec<VaultEntry> = items.into_iter().map(VaultEntry::Item).collect();
    render::render_table(&entries);
    session.lock();
    Ok(())
}

/// Find an item by id, or by case-insensitive name when the name is unique.
fn resolve(session: &VaultSession, needle: &str) -> anyhow::Result<VaultItem> {
    let items = session.engine().items();
    if let Some(item) = items.iter().find(|item| item.id.as_str() == needle) {
        return Ok(item.clone());
    }

    let lowered = needle.to_lowercase();
    let mut matches: Vec<VaultItem> = items
        .into_iter()
        .filter(|item| item.name.to_lowercase() == lowered)
        .collect();
    match matches.len() {
        0 => anyhow::bail!("No item named or with id '{}'", needle),
        1 => Ok(matches.remove(0)),
        n => {
            let ids: Vec<String> = matches.iter().map(|item| item.id.to_string()).collect();
            anyhow::bail!("{} items are named '{}', use an id: {}", n, needle, ids.join(", "))
        }
    }
}

fn new_item(args: &AddArgs, password: Option<String>) -> anyhow::Result<NewItem> {
    let details = match args.category {
        ItemCategory::Login => ItemDetails::Login(LoginFields {
            username: args.username.clone(),
            password: password.map(SecretString::new),
            url: args.url.clone(),
        }),
        ItemCategory::SecureNote => ItemDetails::SecureNote,
        ItemCategory::CreditCard => ItemDetails::CreditCard(CardFields {
            cardholder: args.cardholder.clone(),
            number: args.number.clone().map(SecretString::new),
            cvv: args.cvv.clone().map(SecretString::new),
            expiry: args.expiry.clone(),
        }),
        ItemCategory::Identity => ItemDetails::Identity(IdentityFields {
            first_name: args.first_name.clone(),
            last_name: args.last_name.clone(),
            email: args.email.clone(),
            phone: args.phone.clone(),
            company: args.company.clone(),
            ..Default::default()
        }),
    };

    let login_only = args.username.is_some() || args.url.is_some() || args.password.is_some();
    if login_only && args.category != ItemCategory::Login {
        anyhow::bail!("--username, --url and --password only apply to logins");
    }

    let mut new = NewItem::new(&args.name, details).with_favorite(args.favorite);
    new.notes = args.notes.clone();
    new.tags.extend(args.tags.iter().cloned());
    new.validate().context("Invalid item")?;
    Ok(new)
}

fn apply_changes(
    item: &mut VaultItem,
    args: &UpdateArgs,
    password: Option<String>,
) -> anyhow::Result<()> {
    if let Some(name) = &args.name {
        item.name = name.clone();
    }
    if let Some(notes) = &args.notes {
        item.notes = Some(notes.clone()).filter(|n| !n.is_empty());
    }
    if let Some(favorite) = args.favorite {
        item.favorite = favorite;
    }
    item.tags.extend(args.add_tags.iter().cloned());
    for tag in &args.remove_tags {
        item.tags.remove(tag);
    }

    let login_change = args.username.is_some() || args.url.is_some() || password.is_some();
    if login_change {
        let category = item.category();
        let ItemDetails::Login(login) = &mut item.details else {
            anyhow::bail!("'{}' is a {}, not a login", args.item, category);
        };
        if let Some(username) = &args.username {
            login.username = Some(username.clone());
        }
        if let Some(url) = &args.url {
            login.url = Some(url.clone());
        }
        if let Some(password) = password {
            login.password = Some(SecretString::new(password));
        }
    }

    item.validate().context("Invalid item")?;
    Ok(())
}
