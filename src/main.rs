use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::builder::PossibleValuesParser;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use engagement_dashboard::api::{DashboardApi, ProfileUpdate};
use engagement_dashboard::auth::{AuthResolver, AuthState, LOGIN_REQUIRED_MESSAGE};
use engagement_dashboard::client::ApiClient;
use engagement_dashboard::config::Config;
use engagement_dashboard::error::ApiError;
use engagement_dashboard::export::{self, ExportFormat};
use engagement_dashboard::models::{UserProfile, Video};
use engagement_dashboard::report::{self, TableRow};
use engagement_dashboard::search::{filter_records, FilterState, ThresholdOp};
use engagement_dashboard::state::{AppState, FetchTicket};
use engagement_dashboard::table::{
    self, Collation, ColumnSpec, PageSize, SortDirection, SortState,
};
use engagement_dashboard::token_store::FileTokenStore;
use engagement_dashboard::transport::ReqwestTransport;
use engagement_dashboard::views::{
    self, interactions, monthly, questions, sessions, summary, users,
};

#[derive(Parser)]
#[command(name = "engagement-dashboard")]
#[command(about = "Engagement analytics for hosted interactive videos", long_about = None)]
struct Cli {
    /// API base URL; overrides DASHBOARD_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Write the markdown report here instead of stdout
    #[arg(long, global = true)]
    report: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct FilterArgs {
    /// Space-separated terms; quote a phrase to match it whole
    #[arg(long, default_value = "")]
    search: String,
    /// First day included (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day included (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

#[derive(Args, Clone)]
struct TableArgs {
    #[arg(long)]
    sort: Option<String>,
    /// asc or desc; defaults to the column's own default
    #[arg(long)]
    order: Option<SortDirection>,
    /// One-based page number
    #[arg(long, default_value_t = 1)]
    page: i64,
    /// 5, 10, 25 or 50
    #[arg(long, default_value = "10")]
    page_size: PageSize,
    /// Go-to-page entry; out-of-range numbers are clamped
    #[arg(long)]
    jump: Option<String>,
    /// Also write every filtered row to this file
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, value_enum)]
    format: Option<ExportFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session tokens
    Login {
        username: String,
        #[arg(long, env = "DASHBOARD_PASSWORD")]
        password: String,
    },
    /// Blacklist the refresh token and forget the session
    Logout,
    /// Create an account (admins only)
    Register {
        username: String,
        email: String,
        #[arg(long, env = "DASHBOARD_NEW_PASSWORD")]
        password: String,
    },
    /// Show the logged-in account
    Whoami,
    /// Change username, email or password
    Settings {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Show or set content toggles, e.g. `--set benesse_toggle=true`
    Toggles {
        #[arg(long = "set", value_parser = parse_toggle)]
        set: Vec<(String, bool)>,
    },
    /// List videos
    Videos {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Interaction clicks for one video
    Interactions {
        #[arg(long)]
        video: Option<i64>,
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        table: TableArgs,
        /// Only these interaction types
        #[arg(long = "type")]
        types: Vec<String>,
        /// Longest interaction (seconds) in the video-time chart
        #[arg(long, default_value_t = interactions::DEFAULT_DURATION_BOUND)]
        duration_bound: f64,
    },
    /// Question answers for one video
    Questions {
        #[arg(long)]
        video: Option<i64>,
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        table: TableArgs,
        /// Only these question types
        #[arg(long = "type", value_parser = PossibleValuesParser::new(questions::TYPE_OPTIONS))]
        types: Vec<String>,
        /// Average answer time must exceed this many seconds: 0, 10, 20, 30, 60, 120 or 240
        #[arg(long, value_parser = parse_average_time)]
        min_avg_time: Option<f64>,
        /// all, =0, >=25, <=25, >=50, <=50, >=75, <=75 or =100
        #[arg(long)]
        percent: Option<String>,
        /// Question whose answers are broken down
        #[arg(long)]
        question: Option<i64>,
    },
    /// Viewer sessions by OS, browser and device
    Sessions {
        #[arg(long)]
        video: Option<i64>,
        #[arg(long, default_value = "")]
        search: String,
        #[command(flatten)]
        table: TableArgs,
        /// Desktop and/or Mobile
        #[arg(long, value_parser = PossibleValuesParser::new(sessions::DEVICE_OPTIONS))]
        device: Vec<String>,
        /// Leave bots out of the browser breakdown
        #[arg(long)]
        exclude_bots: bool,
    },
    /// Views per month for one video
    Monthly {
        #[arg(long)]
        video: Option<i64>,
        /// First month included (YYYY-MM)
        #[arg(long)]
        from_month: Option<String>,
        /// Last month included (YYYY-MM)
        #[arg(long)]
        to_month: Option<String>,
        #[command(flatten)]
        table: TableArgs,
    },
    /// Stats across every video
    Summary {
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        table: TableArgs,
        /// Status codes 0-4 to include
        #[arg(long)]
        status: Vec<i64>,
    },
    /// Month-over-month view changes
    Trending,
    /// Download a server-side export
    Export {
        #[command(subcommand)]
        target: ExportTarget,
    },
    /// Manage accounts (admins only)
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
}

#[derive(Subcommand)]
enum ExportTarget {
    /// Full JSON export of one video
    Video {
        id: i64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// CSV of one month's views
    Month {
        /// YYYY-MM
        month: String,
        /// Include videos created after the month
        #[arg(long)]
        all: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum UsersCommand {
    List {
        #[arg(long, default_value = "")]
        search: String,
    },
    Delete {
        id: i64,
    },
}

fn parse_toggle(raw: &str) -> Result<(String, bool), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=true|false, got {raw:?}"))?;
    let flag = value
        .trim()
        .parse::<bool>()
        .map_err(|_| format!("toggle value must be true or false, got {value:?}"))?;
    Ok((name.trim().to_string(), flag))
}

fn parse_average_time(raw: &str) -> Result<f64, String> {
    questions::parse_average_time(raw).map_err(|e| e.to_string())
}

fn toggle_lines(toggles: &BTreeMap<String, bool>) -> Vec<String> {
    toggles
        .iter()
        .map(|(name, enabled)| format!("{name}: {enabled}"))
        .collect()
}

fn build_api(config: &Config) -> anyhow::Result<DashboardApi> {
    let transport = ReqwestTransport::new(config.api_url.clone(), config.timeout)
        .context("failed to set up HTTP client")?;
    let store = FileTokenStore::new(config.token_file.clone());
    let client = ApiClient::new(Arc::new(transport), Arc::new(store))
        .with_lookahead(config.refresh_lookahead);
    Ok(DashboardApi::new(client))
}

/// Resolves the session for one view; prints the login notice when there is none.
async fn require_login(api: &DashboardApi) -> Option<UserProfile> {
    let mut resolver = AuthResolver::new();
    match resolver.resolve(api).await {
        AuthState::Authenticated(profile) => Some(profile.clone()),
        _ => {
            println!("{LOGIN_REQUIRED_MESSAGE}");
            None
        }
    }
}

/// Network, server and decode failures become an empty result; auth and
/// storage failures end the command.
fn degrade<T: Default>(result: Result<T, ApiError>, what: &str) -> anyhow::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_degradable() => {
            error!("Failed to fetch {what}: {e}");
            Ok(T::default())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("failed to fetch {what}"))),
    }
}

/// Reports validation failures by their message alone.
fn describe(err: ApiError) -> anyhow::Error {
    match err {
        ApiError::Validation { message, .. } => anyhow::anyhow!(message),
        other => anyhow::Error::new(other),
    }
}

struct Selection {
    video_id: i64,
    title: String,
    ticket: FetchTicket,
}

async fn select_video(
    api: &DashboardApi,
    state: &mut AppState,
    requested: Option<i64>,
) -> anyhow::Result<Option<Selection>> {
    let videos: Vec<Video> = degrade(api.videos().await, "videos")?;
    let video_id = match requested {
        Some(id) => {
            state.select_video(id);
            Some(id)
        }
        None => state.select_default(&videos),
    };
    let Some(video_id) = video_id else {
        return Ok(None);
    };
    let title = videos
        .iter()
        .find(|video| video.video_id == video_id)
        .map(|video| video.title.clone())
        .unwrap_or_else(|| format!("Video {video_id}"));
    info!("Showing video {video_id} ({title})");
    Ok(Some(Selection {
        video_id,
        title,
        ticket: state.generation().begin(),
    }))
}

fn filter_state(filters: &FilterArgs, include: Option<BTreeSet<String>>) -> FilterState {
    let date_range = match (filters.from, filters.to) {
        (None, None) => None,
        (from, to) => Some((
            from.unwrap_or(NaiveDate::MIN),
            to.unwrap_or_else(|| Utc::now().date_naive()),
        )),
    };
    FilterState {
        search_query: filters.search.clone(),
        date_range,
        include,
        threshold: None,
    }
}

fn include_set(values: &[String]) -> Option<BTreeSet<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().cloned().collect())
    }
}

fn sort_state(table: &TableArgs, default: &str, columns: &[ColumnSpec]) -> anyhow::Result<SortState> {
    let column = table.sort.as_deref().unwrap_or(default);
    if !columns.iter().any(|spec| spec.name == column) {
        let names: Vec<&str> = columns.iter().map(|spec| spec.name).collect();
        bail!("cannot sort by {column:?}; choose one of {}", names.join(", "));
    }
    let mut state = SortState::for_column(column, columns);
    if let Some(direction) = table.order {
        state.direction = direction;
    }
    Ok(state)
}

fn render_rows<R>(title: &str, rows: &[&R], sort: &SortState, table: &TableArgs) -> anyhow::Result<String>
where
    R: TableRow + Serialize,
{
    let pages = table::total_pages(rows.len(), table.page_size);
    let index = table
        .jump
        .as_deref()
        .and_then(|input| table::jump_to_page(input, pages))
        .map(|index| index as i64)
        .unwrap_or(table.page - 1);
    let page = table::paginate(rows, index, table.page_size);

    if let Some(out) = &table.out {
        let format = table.format.unwrap_or_else(|| ExportFormat::from_path(out));
        export::write_table(rows, out, format)?;
    }
    Ok(report::table_section(title, &page, sort))
}

fn emit(output: &str, report_path: &Option<PathBuf>) -> anyhow::Result<()> {
    match report_path {
        Some(path) => {
            export::save_bytes(path, output.as_bytes())?;
            println!("Report written to {}.", path.display());
        }
        None => print!("{output}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().with_api_url(cli.api_url.clone());
    let api = build_api(&config)?;
    let mut state = AppState::new();

    match cli.command {
        Commands::Login { username, password } => {
            api.login(&username, &password).await.map_err(describe)?;
            println!("Logged in as {username}.");
        }
        Commands::Logout => {
            api.logout().await?;
            println!("Logged out.");
        }
        Commands::Register {
            username,
            email,
            password,
        } => {
            let Some(profile) = require_login(&api).await else {
                return Ok(());
            };
            if !profile.is_superuser {
                bail!("only administrators can register users");
            }
            api.register(&username, &email, &password)
                .await
                .map_err(describe)?;
            println!("Registered {username}.");
        }
        Commands::Whoami => {
            let Some(mut profile) = require_login(&api).await else {
                return Ok(());
            };
            profile.content_toggles = api.content_toggles().await?.0;
            let mut output = report::heading(&profile.username, &profile.email);
            output.push_str(&report::markdown_table(&[&profile]));
            output.push_str(&report::list_section(
                "Content toggles",
                &toggle_lines(&profile.content_toggles),
            ));
            emit(&output, &cli.report)?;
        }
        Commands::Settings {
            username,
            email,
            password,
        } => {
            if require_login(&api).await.is_none() {
                return Ok(());
            }
            let update = ProfileUpdate {
                username,
                email,
                password,
            };
            if update.is_empty() {
                bail!("nothing to change; pass --username, --email or --password");
            }
            api.update_profile(&update).await.map_err(describe)?;
            println!("Profile updated.");
        }
        Commands::Toggles { set } => {
            if require_login(&api).await.is_none() {
                return Ok(());
            }
            let toggles = if set.is_empty() {
                api.content_toggles().await?
            } else {
                let changes: BTreeMap<String, bool> = set.into_iter().collect();
                api.update_content_toggles(&changes)
                    .await
                    .map_err(describe)?
            };
            let mut output = report::heading("Content toggles", "");
            output.push_str(&report::bullets(&toggle_lines(&toggles.0)));
            emit(&output, &cli.report)?;
        }
        Commands::Videos { filters } => {
            if require_login(&api).await.is_none() {
                return Ok(());
            }
            let videos = degrade(api.videos().await, "videos")?;
            let filter = filter_state(&filters, None);
            let shown = filter_records(&videos, &filter.search_query, &summary::video_predicates(&filter));

            let mut output = report::heading("Videos", &format!("{} of {} videos", shown.len(), videos.len()));
            output.push_str(&report::rows_or_empty(&shown));
            emit(&output, &cli.report)?;
        }
        Commands::Interactions {
            video,
            filters,
            table,
            types,
            duration_bound,
        } => {
            if require_login(&api).await.is_none() {
                return Ok(());
            }
            let sort = sort_state(&table, interactions::DEFAULT_SORT, &interactions::COLUMNS)?;
            let Some(selection) = select_video(&api, &mut state, video).await? else {
                emit(&report::empty_view("Interactions"), &cli.report)?;
                return Ok(());
            };
            let fetched = degrade(api.interactions(selection.video_id).await, "interactions")?;
            let Some(records) = state.generation().accept(selection.ticket, fetched) else {
                return Ok(());
            };
            let duration = degrade(api.video_stats(selection.video_id).await, "video stats")?
                .first()
                .map(|stats| stats.video_duration_seconds)
                .unwrap_or_default();

            let filter = filter_state(&filters, include_set(&types));
            let preds = interactions::predicates(&filter);
            let collation = Collation::new();
            let rows = views::filter_and_sort(&records, &filter.search_query, &preds, &sort, &collation);
            let charts = interactions::charts(&rows);

            let mut output = report::heading("Interactions", &selection.title);
            output.push_str(&report::bucket_section("Clicks per interaction type", &charts.clicks_by_type));
            output.push_str(&report::bucket_section("Clicks per action type", &charts.clicks_by_action_type));
            output.push_str(&report::bucket_section("Interactions per type", &charts.interactions_by_type));
            output.push_str(&report::histogram_section(
                "Clicks by video time",
                &interactions::clicks_by_video_time(&rows, duration, duration_bound),
            ));
            output.push_str(&render_rows("Interactions", &rows, &sort, &table)?);
            emit(&output, &cli.report)?;
        }
        Commands::Questions {
            video,
            filters,
            table,
            types,
            min_avg_time,
            percent,
            question,
        } => {
            if require_login(&api).await.is_none() {
                return Ok(());
            }
            let sort = sort_state(&table, questions::DEFAULT_SORT, &questions::COLUMNS)?;
            let percent = questions::parse_percent_filter(percent.as_deref())?;
            let Some(selection) = select_video(&api, &mut state, video).await? else {
                emit(&report::empty_view("Questions"), &cli.report)?;
                return Ok(());
            };
            let fetched = degrade(api.questions(selection.video_id).await, "questions")?;
            let Some(fetched) = state.generation().accept(selection.ticket, fetched) else {
                return Ok(());
            };
            let records = questions::decorate(fetched);

            let mut filter = filter_state(&filters, include_set(&types));
            filter.threshold = min_avg_time.map(|seconds| (ThresholdOp::Greater, seconds));
            let preds = questions::predicates(&filter, percent);
            let collation = Collation::new();
            let rows = views::filter_and_sort(&records, &filter.search_query, &preds, &sort, &collation);
            let charts = questions::charts(&rows);

            let mut output = report::heading("Questions", &selection.title);
            output.push_str(&report::pair_section(
                "Answers per question type",
                ("correct", "incorrect"),
                &charts.answers_by_type,
            ));
            output.push_str(&report::bucket_section("Questions per type", &charts.questions_by_type));

            let timeline: Vec<String> = questions::answers_timeline(&rows)
                .iter()
                .map(|point| {
                    format!(
                        "{}: {} answered, {} correct",
                        point.label, point.answered, point.correct
                    )
                })
                .collect();
            output.push_str(&report::list_section("Answers by question", &timeline));

            let selected = question.or_else(|| questions::default_selected_question(&records));
            output.push_str("## Answer breakdown\n");
            match selected.and_then(|id| records.iter().find(|q| q.question_id == id)) {
                Some(chosen) => {
                    let answers = degrade(api.question_answers(chosen.question_id).await, "answers")?;
                    let slices = questions::answer_breakdown(&answers, chosen.question_id, chosen.total_answered);
                    let lines: Vec<String> = slices
                        .iter()
                        .map(|slice| {
                            format!(
                                "\"{}\": {:.1}% ({}){}",
                                slice.label,
                                slice.percent,
                                slice.count,
                                if slice.is_correct { " correct" } else { "" }
                            )
                        })
                        .collect();
                    output.push_str(&format!("{}\n", chosen.title));
                    output.push_str(&report::bullets(&lines));
                }
                None => output.push_str(&report::bullets(&[])),
            }
            output.push_str(&render_rows("Questions", &rows, &sort, &table)?);
            emit(&output, &cli.report)?;
        }
        Commands::Sessions {
            video,
            search,
            table,
            device,
            exclude_bots,
        } => {
            if require_login(&api).await.is_none() {
                return Ok(());
            }
            let sort = sort_state(&table, sessions::DEFAULT_SORT, &sessions::COLUMNS)?;
            let Some(selection) = select_video(&api, &mut state, video).await? else {
                emit(&report::empty_view("Sessions"), &cli.report)?;
                return Ok(());
            };
            let fetched = degrade(api.view_sessions(selection.video_id).await, "view sessions")?;
            let Some(records) = state.generation().accept(selection.ticket, fetched) else {
                return Ok(());
            };

            let filter = FilterState {
                search_query: search,
                include: include_set(&device),
                ..FilterState::default()
            };
            let preds = sessions::predicates(&filter);
            let collation = Collation::new();
            let rows = views::filter_and_sort(&records, &filter.search_query, &preds, &sort, &collation);
            let charts = sessions::charts(&rows, exclude_bots);

            let mut output = report::heading("Sessions", &selection.title);
            output.push_str(&report::bucket_section("Sessions by OS", &charts.sessions_by_os));
            output.push_str(&report::pair_section("Browsers", ("mobile", "desktop"), &charts.browsers));
            output.push_str(&report::list_section(
                "Devices",
                &[
                    format!("Mobile: {}", charts.devices.mobile),
                    format!("Desktop: {}", charts.devices.desktop),
                ],
            ));
            output.push_str(&render_rows("Sessions", &rows, &sort, &table)?);
            emit(&output, &cli.report)?;
        }
        Commands::Monthly {
            video,
            from_month,
            to_month,
            table,
        } => {
            if require_login(&api).await.is_none() {
                return Ok(());
            }
            let sort = sort_state(&table, monthly::DEFAULT_SORT, &monthly::COLUMNS)?;
            let from = from_month.as_deref().map(monthly::parse_month).transpose()?;
            let to = to_month.as_deref().map(monthly::parse_month).transpose()?;
            let Some(selection) = select_video(&api, &mut state, video).await? else {
                emit(&report::empty_view("Monthly views"), &cli.report)?;
                return Ok(());
            };
            let fetched = degrade(api.monthly_views(selection.video_id).await, "monthly views")?;
            let Some(fetched) = state.generation().accept(selection.ticket, fetched) else {
                return Ok(());
            };
            let records = monthly::decorate(fetched);
            let preds = monthly::month_range(from, to);
            let collation = Collation::new();
            let rows = views::filter_and_sort(&records, "", &preds, &sort, &collation);

            let mut output = report::heading("Monthly views", &selection.title);
            let series: Vec<String> = monthly::series(&rows)
                .iter()
                .map(|point| {
                    format!(
                        "{}: {} started, {} finished, {} passed, {} failed, {} unfinished",
                        point.label, point.started, point.finished, point.passed, point.failed, point.unfinished
                    )
                })
                .collect();
            output.push_str(&report::list_section("Views per month", &series));
            output.push_str(&render_rows("Monthly views", &rows, &sort, &table)?);
            emit(&output, &cli.report)?;
        }
        Commands::Summary {
            filters,
            table,
            status,
        } => {
            let Some(_) = require_login(&api).await else {
                return Ok(());
            };
            let sort = sort_state(&table, summary::DEFAULT_SORT, &summary::COLUMNS)?;
            let toggles = degrade(api.content_toggles().await, "content toggles")?;
            let ratings = if toggles.0.get(summary::RATINGS_TOGGLE).copied().unwrap_or(false) {
                degrade(api.video_ratings().await, "video ratings")?
            } else {
                Vec::new()
            };
            let stats = degrade(api.all_video_stats().await, "video stats")?;
            let records = summary::merge(stats, &ratings);

            let statuses: Vec<String> = status
                .iter()
                .map(|code| summary::status_label(*code).into_owned())
                .collect();
            let filter = filter_state(&filters, include_set(&statuses));
            let preds = summary::predicates(&filter);
            let collation = Collation::new();
            let rows = views::filter_and_sort(&records, &filter.search_query, &preds, &sort, &collation);

            let overall = summary::Totals::of(&records);
            let filtered = summary::Totals::of(rows.iter().copied());
            let mut output = report::heading("Summary", "All videos");
            let totals: Vec<String> = filtered
                .compare(&overall)
                .iter()
                .map(|(label, part, whole)| {
                    format!("{label}: {part} / {whole} ({}%)", summary::share(*part, *whole))
                })
                .collect();
            output.push_str(&report::list_section("Totals", &totals));
            output.push_str(&render_rows("Videos", &rows, &sort, &table)?);
            emit(&output, &cli.report)?;
        }
        Commands::Trending => {
            if require_login(&api).await.is_none() {
                return Ok(());
            }
            let changes = degrade(api.past_two_months().await, "monthly changes")?;
            let videos = degrade(api.videos().await, "videos")?;
            let rows = summary::trending(changes, &videos);

            let mut output = report::heading("Trending", "Last month against the month before");
            output.push_str(&report::rows_or_empty(&rows));
            emit(&output, &cli.report)?;
        }
        Commands::Export { target } => {
            if require_login(&api).await.is_none() {
                return Ok(());
            }
            match target {
                ExportTarget::Video { id, out } => {
                    let body = api
                        .export_video(id)
                        .await
                        .with_context(|| format!("failed to export video {id}"))?;
                    let path = out.unwrap_or_else(|| {
                        PathBuf::from(summary::video_export_file_name(id, Utc::now()))
                    });
                    export::save_bytes(&path, &body)?;
                    println!("Video {id} exported to {}.", path.display());
                }
                ExportTarget::Month { month, all, out } => {
                    monthly::parse_month(&month)?;
                    let body = api
                        .export_month(&month, all)
                        .await
                        .with_context(|| format!("failed to export {month}"))?;
                    let path =
                        out.unwrap_or_else(|| PathBuf::from(monthly::export_file_name(&month, all)));
                    export::save_bytes(&path, &body)?;
                    println!("{month} views exported to {}.", path.display());
                }
            }
        }
        Commands::Users { command } => {
            let Some(profile) = require_login(&api).await else {
                return Ok(());
            };
            if !profile.is_superuser {
                bail!("only administrators can manage users");
            }
            match command {
                UsersCommand::List { search } => {
                    let all = degrade(api.list_users().await, "users")?;
                    let shown = users::visible_users(&all, &search);
                    let mut output = report::heading(
                        "Users",
                        &format!("{} of {} accounts", shown.len(), all.len()),
                    );
                    output.push_str(&report::rows_or_empty(&shown));
                    emit(&output, &cli.report)?;
                }
                UsersCommand::Delete { id } => {
                    api.delete_user(id)
                        .await
                        .with_context(|| format!("failed to delete user {id}"))?;
                    println!("Deleted user {id}.");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_show_only_the_message() {
        let err = describe(ApiError::Validation {
            field: "non_field_errors".to_string(),
            message: "Incorrect credentials.".to_string(),
        });
        assert_eq!(err.to_string(), "Incorrect credentials.");

        let other = describe(ApiError::SessionExpired);
        assert_eq!(other.to_string(), ApiError::SessionExpired.to_string());
    }

    #[test]
    fn option_lists_limit_cli_values() {
        let parse = |args: &[&str]| {
            Cli::try_parse_from(std::iter::once("engagement-dashboard").chain(args.iter().copied()))
        };
        assert!(parse(&["sessions", "--device", "Mobile"]).is_ok());
        assert!(parse(&["sessions", "--device", "Tablet"]).is_err());
        assert!(parse(&["questions", "--type", "essay"]).is_ok());
        assert!(parse(&["questions", "--type", "quiz"]).is_err());
        assert!(parse(&["questions", "--min-avg-time", "60"]).is_ok());
        assert!(parse(&["questions", "--min-avg-time", "45"]).is_err());
    }
}
