//! mailsweep - Entry point for the mailbox cleanup command line

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mailsweep::config::Settings;
use mailsweep::domain::{
    system_labels, FilterAction, FilterCriteria, LabelColor, LabelId, MessageId,
};
use mailsweep::providers::email::{GmailClient, GmailCredentials, MailboxApi};
use mailsweep::providers::web::{ExternalOpener, ReqwestUnsubscribeClient, SystemOpener};
use mailsweep::services::{
    AuthService, CancelHandle, CleanupReport, DuplicateService, MailboxService, NewsletterService,
};
use mailsweep::storage::KeychainStore;

#[derive(Parser, Debug)]
#[command(name = "mailsweep", version, about = "Bulk Gmail cleanup")]
struct Cli {
    /// Settings file (default: platform config dir).
    #[arg(long, global = true, env = "MAILSWEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store OAuth credentials and verify them.
    Login {
        #[arg(long, env = "MAILSWEEP_CLIENT_ID")]
        client_id: String,
        #[arg(long, env = "MAILSWEEP_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,
        #[arg(long, env = "MAILSWEEP_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },
    /// Forget stored credentials.
    Logout,
    /// Show whether credentials are stored.
    Status,
    /// Estimate message counts per cleanup category.
    Scan,
    /// Unsubscribe from newsletters and delete their messages.
    Newsletters {
        /// Cap on candidate messages.
        #[arg(long)]
        max: Option<usize>,
        /// Open mailto targets that need manual action.
        #[arg(long, default_value_t = false)]
        open_manual: bool,
    },
    /// Delete repeated automated notifications, keeping the newest.
    Duplicates,
    /// Count (or delete) spam, promotions, social and stale mail.
    Spam {
        /// Delete the listed messages.
        #[arg(long, default_value_t = false)]
        delete: bool,
    },
    /// Archive read mail older than a number of days.
    ArchiveOld {
        #[arg(long)]
        days: Option<u32>,
    },
    /// List messages with large attachments.
    Attachments {
        #[arg(long)]
        min_mb: Option<u32>,
    },
    /// List labels.
    Labels,
    /// Add a label to every message matching a search query.
    ApplyLabel {
        /// Label id, as printed by `labels`.
        label_id: String,
        #[arg(long)]
        query: String,
    },
    /// Create a server-side filter.
    CreateFilter {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        query: Option<String>,
        /// Label id to add; repeatable.
        #[arg(long = "add-label")]
        add_labels: Vec<String>,
        /// Skip the inbox.
        #[arg(long, default_value_t = false)]
        archive: bool,
    },
    /// Create a label.
    CreateLabel {
        name: String,
        /// Background color, `#rrggbb`.
        #[arg(long, requires = "text")]
        background: Option<String>,
        /// Text color, `#rrggbb`.
        #[arg(long, requires = "background")]
        text: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cli.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("loading settings")?;

    let auth = AuthService::new(KeychainStore::default(), settings.api.clone());

    match cli.command {
        Command::Login {
            client_id,
            client_secret,
            refresh_token,
        } => {
            let credentials = GmailCredentials {
                refresh_token,
                client_id,
                client_secret,
            };
            let client = auth.login(&credentials).await?;
            let profile = client
                .get_profile()
                .await
                .context("reading mailbox profile")?;
            println!(
                "Logged in as {} ({} messages)",
                profile.email_address, profile.messages_total
            );
        }
        Command::Logout => {
            auth.logout(None).await?;
            println!("Logged out");
        }
        Command::Status => {
            if auth.is_authenticated().await? {
                println!("Credentials stored");
            } else {
                println!("Not logged in");
            }
        }
        Command::Scan => {
            let client = auth.resume().await?;
            let scan = MailboxService::new(settings).scan(&client).await?;
            let c = scan.categories;
            println!("Messages:     {}", scan.total_messages);
            println!("Threads:      {}", scan.total_threads);
            println!("Newsletters:  {}", c.newsletters);
            println!("Spam:         {}", c.spam);
            println!("Promotions:   {}", c.promotions);
            println!("Social:       {}", c.social);
            println!("Old:          {}", c.old);
            println!("Attachments:  {}", c.with_attachments);
            println!("Unread:       {}", c.unread);
        }
        Command::Newsletters { max, open_manual } => {
            if max.is_some() {
                settings.newsletters.max_messages = max;
            }
            let client = auth.resume().await?;
            newsletters(&client, settings, open_manual).await?;
        }
        Command::Duplicates => {
            let client = auth.resume().await?;
            let outcome = DuplicateService::new(settings).clean(&client).await?;
            println!(
                "Deleted {} duplicates across {} groups",
                outcome.deleted, outcome.groups
            );
        }
        Command::Spam { delete } => {
            let client = auth.resume().await?;
            let service = MailboxService::new(settings);
            let refs = service.spam_and_promotions(&client).await?;
            if delete {
                let ids: Vec<MessageId> = refs.into_iter().map(|r| r.id).collect();
                let deleted = service.delete_messages(&client, &ids).await?;
                println!("Deleted {deleted} messages");
            } else {
                println!("{} spam, promotional, social or stale messages", refs.len());
            }
        }
        Command::ArchiveOld { days } => {
            let days = days.unwrap_or(settings.archive.older_than_days);
            let client = auth.resume().await?;
            let service = MailboxService::new(settings);
            let old = service.old_messages(&client, days).await?;
            let ids: Vec<MessageId> = old.into_iter().map(|m| m.id).collect();
            let archived = service.archive(&client, &ids).await?;
            println!("Archived {archived} messages older than {days} days");
        }
        Command::Attachments { min_mb } => {
            let min_mb = min_mb.unwrap_or(settings.attachments.min_size_mb);
            let client = auth.resume().await?;
            let summaries = MailboxService::new(settings)
                .large_attachments(&client, min_mb)
                .await?;
            for s in &summaries {
                println!(
                    "{:>8.1} MB  {:>2} files  {}  {}",
                    s.total_size() as f64 / 1_048_576.0,
                    s.attachment_count(),
                    s.from,
                    s.subject
                );
            }
            println!("{} messages", summaries.len());
        }
        Command::Labels => {
            let client = auth.resume().await?;
            let labels = MailboxService::new(settings).list_labels(&client).await?;
            for label in labels.iter().filter(|l| !l.is_system) {
                println!("{}  {}", label.id, label.name);
            }
        }
        Command::ApplyLabel { label_id, query } => {
            let client = auth.resume().await?;
            let service = MailboxService::new(settings);
            let ids: Vec<MessageId> = service
                .list_all(&client, &query, None)
                .await?
                .into_iter()
                .map(|r| r.id)
                .collect();
            let labeled = service
                .apply_label(&client, &ids, &LabelId::from(label_id))
                .await?;
            println!("Labeled {labeled} messages");
        }
        Command::CreateFilter {
            from,
            subject,
            query,
            add_labels,
            archive,
        } => {
            if from.is_none() && subject.is_none() && query.is_none() {
                bail!("a filter needs --from, --subject or --query");
            }
            let criteria = FilterCriteria {
                from,
                subject,
                query,
                ..FilterCriteria::default()
            };
            let action = FilterAction {
                add_label_ids: add_labels.into_iter().map(LabelId::from).collect(),
                remove_label_ids: if archive {
                    vec![system_labels::inbox()]
                } else {
                    Vec::new()
                },
                ..FilterAction::default()
            };
            let client = auth.resume().await?;
            let filter = MailboxService::new(settings)
                .create_filter(&client, &criteria, &action)
                .await?;
            println!("Created filter {}", filter.id);
        }
        Command::CreateLabel {
            name,
            background,
            text,
        } => {
            let color = match (text, background) {
                (Some(text), Some(background)) => match LabelColor::new(&text, &background) {
                    Some(color) => Some(color),
                    None => bail!("colors must be #rrggbb"),
                },
                _ => None,
            };
            let client = auth.resume().await?;
            match MailboxService::new(settings)
                .create_label(&client, &name, color.as_ref())
                .await?
            {
                Some(label) => println!("Created label {} ({})", label.name, label.id),
                None => println!("Label {name} already exists"),
            }
        }
    }

    Ok(())
}

async fn newsletters(client: &GmailClient, settings: Settings, open_manual: bool) -> anyhow::Result<()> {
    let web = ReqwestUnsubscribeClient::new();
    let service = NewsletterService::new(settings);

    let cancel = CancelHandle::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let outcome = service
        .run(client, &web, cancel, |p| {
            eprint!("\rProcessing senders: {:>3.0}%", p.fraction() * 100.0);
        })
        .await;
    eprintln!();

    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            if let Some(partial) = e.partial_report() {
                print_report(partial);
            }
            return Err(e.into());
        }
    };
    print_report(&report);

    if open_manual {
        let opener = SystemOpener;
        for link in report
            .manual_actions()
            .filter_map(|r| r.unsubscribe_link.as_ref())
        {
            opener.open(link.as_str());
        }
    }
    Ok(())
}

fn print_report(report: &CleanupReport) {
    for r in &report.results {
        println!(
            "{:<13} {:>5} msgs  {:>5} deleted  {}{}",
            r.status.label(),
            r.email_count,
            r.deleted_count,
            r.from,
            r.error
                .as_deref()
                .map(|e| format!("  ({e})"))
                .unwrap_or_default()
        );
    }
    let s = report.stats;
    println!(
        "{} candidates, {} unsubscribed, {} deleted, {} need manual action",
        s.total_emails, s.unsubscribed, s.deleted, s.manual
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_filter_and_label_commands() {
        let cli = Cli::try_parse_from([
            "mailsweep",
            "create-filter",
            "--from",
            "news@example.com",
            "--add-label",
            "Label_1",
            "--add-label",
            "Label_2",
            "--archive",
        ])
        .unwrap();
        match cli.command {
            Command::CreateFilter {
                from,
                add_labels,
                archive,
                ..
            } => {
                assert_eq!(from.as_deref(), Some("news@example.com"));
                assert_eq!(add_labels, vec!["Label_1", "Label_2"]);
                assert!(archive);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from(["mailsweep", "apply-label", "Label_1", "--query", "from:shop"])
            .unwrap();
        assert!(matches!(cli.command, Command::ApplyLabel { .. }));

        let cli = Cli::try_parse_from(["mailsweep", "spam", "--delete"]).unwrap();
        assert!(matches!(cli.command, Command::Spam { delete: true }));
    }
}
