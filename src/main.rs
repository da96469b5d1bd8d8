use anyhow::{Context, Result, anyhow};
use apiprobe::config::BASE_URL_ENV;
use apiprobe::http::DEFAULT_USER_AGENT;
use apiprobe::{
    ApiClient, ApiResponse, Config, GraphqlOptions, RequestOptions, RequestParams, ResponseBody,
};
use clap::Parser;
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;

/// apiprobe - retrying HTTP/GraphQL requests for end-to-end API checks
///
/// Responses with a status listed via --retry-status are retried up to
/// --attempts times; the last response is printed even if it is still one of
/// those statuses. Only connection failures make the command fail.
///
/// Examples:
///   apiprobe --base-url https://api.example.com request GET health
///   apiprobe --retry-status 500 --attempts 3 graphql --query '{ ping }'
#[derive(Parser, Debug)]
#[command(author, version = env!("APIPROBE_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API base URL (also via CONFIG_BASEURL)
    #[arg(long = "base-url", env = BASE_URL_ENV, value_name = "URL", global = true)]
    base_url: Option<String>,

    /// Status code that triggers another attempt (repeatable)
    #[arg(long = "retry-status", value_name = "CODE", global = true)]
    retry_status: Vec<u16>,

    /// Maximum number of attempts
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..), global = true)]
    attempts: u32,

    /// Delay between attempts in milliseconds
    #[arg(long = "delay-ms", default_value_t = 500, global = true)]
    delay_ms: u64,

    /// Extra request header as NAME:VALUE (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE", value_parser = parse_header, global = true)]
    headers: Vec<(String, String)>,

    /// User-Agent sent when no User-Agent header is given
    #[arg(long = "user-agent", default_value = DEFAULT_USER_AGENT, global = true)]
    user_agent: String,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send a request to an endpoint under the base URL
    Request(RequestArgs),

    /// Post a GraphQL operation to <base-url>/graphql
    Graphql(GraphqlArgs),
}

#[derive(clap::Args, Debug)]
struct RequestArgs {
    /// HTTP method, e.g. GET or POST
    #[arg(value_name = "METHOD", value_parser = parse_method)]
    method: Method,

    /// Endpoint path relative to the base URL
    #[arg(value_name = "ENDPOINT")]
    endpoint: String,

    /// JSON body
    #[arg(long, value_name = "JSON", value_parser = parse_json)]
    data: Option<Value>,

    /// Multipart form field as NAME=VALUE (repeatable; takes precedence over --data)
    #[arg(long = "form", value_name = "NAME=VALUE", value_parser = parse_form_field)]
    form: Vec<(String, String)>,
}

#[derive(clap::Args, Debug)]
struct GraphqlArgs {
    /// GraphQL query document
    #[arg(long, value_name = "QUERY")]
    query: String,

    /// Variables as a JSON object
    #[arg(long, value_name = "JSON", value_parser = parse_json)]
    variables: Option<Value>,
}

fn parse_method(s: &str) -> Result<Method, String> {
    Method::from_bytes(s.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("invalid HTTP method '{}'", s))
}

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {}", e))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got '{}'", s))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn parse_form_field(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    Ok((name.to_string(), value.to_string()))
}

fn render_response(response: &ApiResponse) -> Result<String> {
    let body = match &response.body {
        ResponseBody::Json(value) => serde_json::to_string_pretty(value)?,
        ResponseBody::Text(text) => text.clone(),
        ResponseBody::Bytes(bytes) => format!("<{} bytes of binary data>", bytes.len()),
    };
    Ok(format!("HTTP {}\n{}", response.status_code(), body))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = Config::default()
        .with_base_url(cli.base_url.clone().unwrap_or_default())
        .with_user_agent(cli.user_agent.clone());
    let client = ApiClient::with_reqwest(config)?;
    let headers: BTreeMap<String, String> = cli.headers.iter().cloned().collect();

    let response = match cli.command {
        Commands::Request(args) => {
            let mut params = RequestParams {
                headers,
                data: args.data,
                form_data: None,
            };
            if !args.form.is_empty() {
                params.form_data = Some(args.form.into_iter().collect());
            }

            let options = RequestOptions::new(
                args.method,
                client.config().base_url.clone(),
                args.endpoint,
            )
            .with_params(params)
            .with_retry_status_codes(cli.retry_status)
            .with_attempts(cli.attempts)
            .with_delay_ms(cli.delay_ms);

            client.request(options).await
        }
        Commands::Graphql(args) => {
            let mut options = GraphqlOptions::new(args.query)
                .with_retry_status_codes(cli.retry_status)
                .with_attempts(cli.attempts)
                .with_delay_ms(cli.delay_ms);
            options.headers = headers;
            if let Some(variables) = args.variables {
                if !variables.is_object() {
                    return Err(anyhow!("--variables must be a JSON object"));
                }
                options = options.with_variables(variables);
            }

            client.graphql(options).await
        }
    }
    .context("Request failed")?;

    println!("{}", render_response(&response)?);
    Ok(())
}
