use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

#[derive(Parser)]
#[command(name = "soaplab")]
#[command(about = "A CLI for reading and editing Soap Lab news")]
struct Cli {
    /// Base URL for the Soap Lab service
    #[arg(long, env = "SOAPLAB_URL", default_value = "http://localhost:3000")]
    service_url: Url,

    /// Access token for editor commands
    #[arg(long, env = "SOAPLAB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read and edit news items
    #[command(subcommand)]
    News(NewsCommand),
}

#[derive(Subcommand)]
enum NewsCommand {
    /// List news items, newest first with featured items on top
    List {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        category: Option<String>,
        /// Only featured (true) or only regular (false) items
        #[arg(long)]
        featured: Option<bool>,
        /// Comma-separated tags; items with any of them match
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// Include drafts (requires an editor token)
        #[arg(long)]
        drafts: bool,
    },
    /// Show one news item
    Show {
        id: String,
        /// Look the item up through the editor API so drafts are visible
        #[arg(long)]
        draft: bool,
    },
    /// List every tag used by published items
    Tags,
    /// Create a news item
    Create {
        #[arg(short, long)]
        title: String,
        /// Body text; HTML is allowed
        #[arg(short, long, conflicts_with = "content_file")]
        content: Option<String>,
        /// Read the body from a file
        #[arg(long)]
        content_file: Option<std::path::PathBuf>,
        #[arg(short, long)]
        excerpt: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long)]
        featured: bool,
        /// Publish immediately instead of saving a draft
        #[arg(long)]
        publish: bool,
    },
    /// Make an item visible to readers
    Publish { id: String },
    /// Hide an item from readers
    Unpublish { id: String },
    /// Pin an item to the top of listings
    Feature {
        id: String,
        /// Remove the pin instead
        #[arg(long)]
        off: bool,
    },
    /// Permanently delete an item
    Delete { id: String },
}

#[derive(Serialize)]
struct NewsDraft {
    title: String,
    content: String,
    excerpt: Option<String>,
    category: Option<String>,
    tags: Option<Vec<String>>,
    image_url: Option<String>,
    featured: bool,
    published: bool,
}

#[derive(Deserialize)]
struct NewsItem {
    id: String,
    title: String,
    category: String,
    tags: Vec<String>,
    featured: bool,
    published: bool,
    published_at: Option<String>,
    excerpt: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    page: u32,
    total: u64,
    total_pages: u32,
}

#[derive(Deserialize)]
struct NewsPage {
    data: Vec<NewsItem>,
    pagination: Pagination,
}

#[derive(Deserialize)]
struct TagsResponse {
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
    code: Option<String>,
}

struct ApiClient {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("invalid service URL {}", self.base))
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .context("this command needs an editor token (--token or SOAPLAB_TOKEN)")?;
        Ok(request.bearer_auth(token))
    }
}

/// Turns a non-success response into an error carrying the server's message.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(ErrorResponse {
            error,
            code: Some(code),
        }) => bail!("{status}: {error} ({code})"),
        Ok(ErrorResponse { error, code: None }) => bail!("{status}: {error}"),
        Err(_) if body.is_empty() => bail!("{status}"),
        Err(_) => bail!("{status}: {body}"),
    }
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn print_item_line(item: &NewsItem) {
    let mut markers = Vec::new();
    if item.featured {
        markers.push("featured");
    }
    if !item.published {
        markers.push("draft");
    }
    let markers = if markers.is_empty() {
        String::new()
    } else {
        format!(" [{}]", markers.join(", "))
    };

    println!(
        "{}  {}  {}{}",
        item.id,
        item.published_at.as_deref().unwrap_or("-"),
        item.title,
        markers
    );
}

fn print_item(item: &NewsItem) {
    println!("ID:        {}", item.id);
    println!("Title:     {}", item.title);
    println!("Category:  {}", item.category);
    println!("Tags:      {}", item.tags.join(", "));
    println!("Published: {}", item.published);
    println!("Featured:  {}", item.featured);
    if let Some(published_at) = &item.published_at {
        println!("Date:      {published_at}");
    }
    if let Some(excerpt) = &item.excerpt {
        println!("Excerpt:   {excerpt}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let api = ApiClient {
        client: Client::new(),
        base: cli.service_url,
        token: cli.token,
    };

    match cli.command {
        Commands::News(command) => run_news(&api, command).await,
    }
}

async fn run_news(api: &ApiClient, command: NewsCommand) -> Result<()> {
    match command {
        NewsCommand::List {
            page,
            limit,
            category,
            featured,
            tags,
            search,
            drafts,
        } => {
            let path = if drafts {
                "/api/v1/admin/news"
            } else {
                "/api/v1/news"
            };
            let mut url = api.endpoint(path)?;
            {
                let mut query = url.query_pairs_mut();
                if let Some(page) = page {
                    query.append_pair("page", &page.to_string());
                }
                if let Some(limit) = limit {
                    query.append_pair("limit", &limit.to_string());
                }
                if let Some(category) = &category {
                    query.append_pair("category", category);
                }
                if let Some(featured) = featured {
                    query.append_pair("featured", &featured.to_string());
                }
                if let Some(tags) = &tags {
                    query.append_pair("tags", tags);
                }
                if let Some(search) = &search {
                    query.append_pair("search", search);
                }
            }

            let mut request = api.client.get(url);
            if drafts {
                request = api.authorized(request)?;
            }
            let page: NewsPage = check(request.send().await?).await?.json().await?;

            for item in &page.data {
                print_item_line(item);
            }
            println!(
                "Page {} of {} ({} items)",
                page.pagination.page, page.pagination.total_pages, page.pagination.total
            );
        }
        NewsCommand::Show { id, draft } => {
            let item: NewsItem = if draft {
                let url = api.endpoint(&format!("/api/v1/admin/news/{id}"))?;
                let request = api.authorized(api.client.get(url))?;
                check(request.send().await?).await?.json().await?
            } else {
                let url = api.endpoint(&format!("/api/v1/news/{id}"))?;
                check(api.client.get(url).send().await?).await?.json().await?
            };
            print_item(&item);
        }
        NewsCommand::Tags => {
            let url = api.endpoint("/api/v1/news/tags")?;
            let tags: TagsResponse = check(api.client.get(url).send().await?)
                .await?
                .json()
                .await?;
            for tag in tags.tags {
                println!("{tag}");
            }
        }
        NewsCommand::Create {
            title,
            content,
            content_file,
            excerpt,
            category,
            tags,
            image_url,
            featured,
            publish,
        } => {
            let content = match (content, content_file) {
                (Some(content), _) => content,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => bail!("either --content or --content-file is required"),
            };

            let draft = NewsDraft {
                title,
                content,
                excerpt,
                category,
                tags: tags.as_deref().map(split_tags),
                image_url,
                featured,
                published: publish,
            };

            let url = api.endpoint("/api/v1/admin/news")?;
            let request = api.authorized(api.client.post(url).json(&draft))?;
            let item: NewsItem = check(request.send().await?).await?.json().await?;
            println!("News item created with ID: {}", item.id);
        }
        NewsCommand::Publish { id } => {
            let item = patch(api, &id, json!({ "published": true })).await?;
            println!(
                "Published {} at {}",
                item.id,
                item.published_at.as_deref().unwrap_or("-")
            );
        }
        NewsCommand::Unpublish { id } => {
            let item = patch(api, &id, json!({ "published": false })).await?;
            println!("Unpublished {}", item.id);
        }
        NewsCommand::Feature { id, off } => {
            let item = patch(api, &id, json!({ "featured": !off })).await?;
            if item.featured {
                println!("Featured {}", item.id);
            } else {
                println!("Unfeatured {}", item.id);
            }
        }
        NewsCommand::Delete { id } => {
            let url = api.endpoint(&format!("/api/v1/admin/news/{id}"))?;
            let request = api.authorized(api.client.delete(url))?;
            check(request.send().await?).await?;
            println!("Deleted {id}");
        }
    }

    Ok(())
}

async fn patch(api: &ApiClient, id: &str, body: serde_json::Value) -> Result<NewsItem> {
    let url = api.endpoint(&format!("/api/v1/admin/news/{id}"))?;
    let request = api.authorized(api.client.put(url).json(&body))?;
    Ok(check(request.send().await?).await?.json().await?)
}
