//! `cbridge` — callback-url command-line interface.
//!
//! Provides four subcommands for working with callback URLs on the
//! command line:
//!
//! - **`build`** — assemble a call URL for an action path from `key=value`
//!   pairs, optionally with return addresses.
//! - **`parse`** — break a URL into its components and parameters.
//! - **`respond`** — answer an inbound call URL with a chosen outcome.
//! - **`demo`** — run the full call/response cycle inside one process.
//!
//! `parse` and `respond` read the URL from an argument or from stdin (`-`).
//! `build` and `respond` print the resulting URL by default; pass `--open`
//! to hand it to the operating system instead.

use std::io::{self, Read};
use std::process::{self, Command};
use std::sync::{Arc, Mutex};

use callbridge::{
    Action, CallbackUrl, EnvReceiver, Exchange, RemoteApp, Response, ResponseKind, ResponseUrl,
    UrlOpener, CLIENT_RESPONSE_PATH,
};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

/// cbridge — callback-url CLI
///
/// Build, inspect, and answer x-callback urls.
#[derive(Parser)]
#[command(name = "cbridge", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Assemble a call URL for an action path.
    ///
    /// Parameters are given as key=value pairs and land in the query
    /// section as-is. With --reply-to, the three return addresses
    /// (x-success, x-error, x-cancel) are embedded so the callee can
    /// answer back into the given scheme.
    ///
    /// Examples:
    ///   cbridge build --scheme notes --path add-note title=groceries pinned=yes
    ///   cbridge build --scheme notes --path add-note title=x --reply-to myapp --open
    Build {
        /// URL scheme of the application to call.
        #[arg(long, value_name = "SCHEME")]
        scheme: String,

        /// Host component of the call URL.
        #[arg(long, value_name = "HOST", default_value = "x-callback-url")]
        host: String,

        /// Action path (slash prefix optional).
        #[arg(long, value_name = "PATH")]
        path: String,

        /// Query parameters, as key=value.
        #[arg(value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Embed return addresses pointing back at this scheme.
        #[arg(long, value_name = "SCHEME")]
        reply_to: Option<String>,

        /// Open the URL with the operating system instead of printing it.
        #[arg(long)]
        open: bool,
    },

    /// Parse a URL and print its components and parameters.
    ///
    /// Pass `-` as URL to read from stdin. Response URLs additionally
    /// show their kind, call id, and any error detail.
    Parse {
        /// The URL, or `-` for stdin.
        url: String,
    },

    /// Answer an inbound call URL with a chosen outcome.
    ///
    /// Extracts the matching return address (x-success, x-error or
    /// x-cancel) from the call URL and appends the given payload or error
    /// detail to it.
    ///
    /// Examples:
    ///   cbridge respond "notes://x-callback-url/add-note?..." success id=42
    ///   cbridge respond - error --code 404 --message "note not found"
    Respond {
        /// The inbound call URL, or `-` for stdin.
        url: String,

        /// Outcome: success | error | cancel
        #[arg(value_name = "OUTCOME")]
        outcome: ResponseKind,

        /// Success payload parameters, as key=value.
        #[arg(value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Error code (error outcome only).
        #[arg(long, value_name = "INT")]
        code: Option<i64>,

        /// Error message (error outcome only).
        #[arg(long, value_name = "TEXT")]
        message: Option<String>,

        /// Open the URL with the operating system instead of printing it.
        #[arg(long)]
        open: bool,
    },

    /// Run the full call/response cycle inside one process.
    ///
    /// Sends a ping action with a callback, plays the callee by echoing
    /// the message back through the generated success address, and shows
    /// the continuation firing.
    Demo {
        /// The message to send around the loop.
        #[arg(long, value_name = "TEXT", default_value = "hello")]
        message: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "callbridge=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        CliCommand::Build {
            scheme,
            host,
            path,
            params,
            reply_to,
            open,
        } => {
            let mut url = CallbackUrl::new(scheme, host, &path);
            for pair in &params {
                url.query.push(parse_pair(pair));
            }

            if let Some(reply_scheme) = reply_to {
                for kind in ResponseKind::ALL {
                    let mut address = CallbackUrl::new(
                        reply_scheme.clone(),
                        "x-callback-url",
                        CLIENT_RESPONSE_PATH,
                    );
                    address.id = url.id;
                    url.query.push((
                        kind.parameter_name().into(),
                        ResponseUrl::new(address, kind).to_url_string(),
                    ));
                }
            }

            emit(&url.to_url_string(), open);
        }

        CliCommand::Parse { url } => {
            let raw = read_input(&url);
            // A response URL is also a plain callback URL; try the richer
            // parse first so its metadata is shown when present.
            match ResponseUrl::parse(&raw) {
                Ok(response) => {
                    println!("kind:    {}", response.kind);
                    println!("id:      {}", response.url.id);
                    if let Some(code) = response.error_code {
                        println!("code:    {}", code);
                    }
                    if let Some(message) = &response.error_message {
                        println!("message: {}", message);
                    }
                    print_components(&response.url);
                }
                Err(_) => {
                    let url =
                        CallbackUrl::parse(&raw).unwrap_or_else(|e| fatal(&e.to_string()));
                    print_components(&url);
                }
            }
        }

        CliCommand::Respond {
            url,
            outcome,
            params,
            code,
            message,
            open,
        } => {
            let raw = read_input(&url);
            let call = CallbackUrl::parse(&raw).unwrap_or_else(|e| fatal(&e.to_string()));

            let address = call.param(outcome.parameter_name()).unwrap_or_else(|| {
                fatal(&format!(
                    "call carries no {} return address; the caller did not \
                     request a callback",
                    outcome.parameter_name()
                ))
            });
            let mut reply =
                ResponseUrl::parse(address).unwrap_or_else(|e| fatal(&e.to_string()));

            match outcome {
                ResponseKind::Success => {
                    for pair in &params {
                        reply.url.query.push(parse_pair(pair));
                    }
                }
                ResponseKind::Error => {
                    reply.error_code = code;
                    reply.error_message = message;
                }
                ResponseKind::Cancel => {}
            }

            emit(&reply.to_url_string(), open);
        }

        CliCommand::Demo { message } => demo(&message),
    }
}

/// Ping action used by the demo: the callee echoes the message back.
#[derive(Serialize, Deserialize)]
struct PingInput {
    message: String,
}

#[derive(Serialize, Deserialize)]
struct PingOutput {
    message: String,
}

struct Ping;

impl Action for Ping {
    type Input = PingInput;
    type Output = PingOutput;
}

/// Captures the last URL "opened", standing in for the platform.
#[derive(Default)]
struct CapturingOpener {
    last: Mutex<Option<String>>,
}

impl UrlOpener for CapturingOpener {
    fn open(&self, url: &str) {
        *self.last.lock().unwrap() = Some(url.to_string());
    }
}

fn demo(message: &str) {
    let opener = Arc::new(CapturingOpener::default());
    let exchange = Exchange::new(
        EnvReceiver::with_scheme("demo-caller"),
        Arc::clone(&opener),
    );

    // Caller side: send the ping with a continuation.
    exchange
        .send_with(
            &RemoteApp::new("demo-callee"),
            &Ping,
            PingInput {
                message: message.into(),
            },
            |response: Response<PingOutput>| match response {
                Response::Success(output) => println!(
                    "4. continuation fired: success, message={:?}",
                    output.message
                ),
                Response::Error { code, message } => {
                    println!("4. continuation fired: error {code}: {message}")
                }
                Response::Cancel => println!("4. continuation fired: cancel"),
            },
        )
        .unwrap_or_else(|e| fatal(&format!("could not encode the demo input: {e}")));

    let call = opener
        .last
        .lock()
        .unwrap()
        .take()
        .unwrap_or_else(|| fatal("the opener saw no URL"));
    println!("1. call opened in the callee:\n   {call}");

    // Callee side: decode the call, do the "work", answer through the
    // success return address.
    let parsed = CallbackUrl::parse(&call).unwrap_or_else(|e| fatal(&e.to_string()));
    let echoed = parsed
        .param("message")
        .unwrap_or_else(|| fatal("call carries no message parameter"))
        .to_string();
    println!("2. callee decoded message={echoed:?}");

    let address = parsed
        .param(ResponseKind::Success.parameter_name())
        .unwrap_or_else(|| fatal("call carries no success return address"));
    let mut reply = ResponseUrl::parse(address).unwrap_or_else(|e| fatal(&e.to_string()));
    reply.url.query.push(("message".into(), echoed));
    let reply = reply.to_url_string();
    println!("3. reply opened in the caller:\n   {reply}");

    // Back on the caller side: the platform delivers the reply URL.
    exchange
        .receive(&reply)
        .unwrap_or_else(|e| fatal(&e.to_string()));
}

/// Print the shared components of a parsed URL.
fn print_components(url: &CallbackUrl) {
    println!("scheme:  {}", url.scheme);
    println!("host:    {}", url.host);
    println!("path:    {}", url.path());
    let json = serde_json::to_string_pretty(&url.query_map())
        .unwrap_or_else(|e| fatal(&format!("could not render parameters: {e}")));
    println!("params:  {}", json);
}

/// Split a `key=value` argument.
fn parse_pair(pair: &str) -> (String, String) {
    match pair.split_once('=') {
        Some((key, value)) => (key.into(), value.into()),
        None => fatal(&format!("invalid parameter {:?}: expected key=value", pair)),
    }
}

/// Print the URL, or hand it to the operating system with --open.
fn emit(url: &str, open: bool) {
    if open {
        let command = if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        };
        if let Err(e) = Command::new(command).arg(url).spawn() {
            fatal(&format!("could not run {command}: {e}"));
        }
    } else {
        println!("{url}");
    }
}

/// Read the argument itself, or stdin when it is `"-"`.
fn read_input(arg: &str) -> String {
    if arg == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .unwrap_or_else(|e| fatal(&format!("failed to read stdin: {e}")));
        buf.trim().to_string()
    } else {
        arg.to_string()
    }
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("cbridge: {}", msg);
    process::exit(2);
}
