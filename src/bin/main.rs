// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use chrono::{NaiveDate, Utc};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use library_ledger_rs::{
    BookDetails, BookId, ConfigError, IssueId, IssueStatus, Library, LoanPolicy,
    MembershipStatus, UserDetails, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Library Ledger - Replay checkout/return events against a catalog
///
/// Loads books and users from CSV, applies the checkout and return events
/// in order, and writes the resulting issues (or a summary) to stdout.
#[derive(Parser, Debug)]
#[command(name = "library-ledger")]
#[command(about = "A library loan engine that replays checkout/return CSVs", long_about = None)]
struct Args {
    /// Loan policy TOML file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the policy's loan period in days
    #[arg(long, value_name = "DAYS")]
    loan_days: Option<u32>,

    /// Override the policy's fine per overdue day
    #[arg(long, value_name = "AMOUNT")]
    fine_rate: Option<Decimal>,

    /// Books CSV: title,author,isbn,total_copies
    #[arg(long, value_name = "FILE")]
    books: PathBuf,

    /// Users CSV: name,email,status
    #[arg(long, value_name = "FILE")]
    users: PathBuf,

    /// Print a one-row summary instead of the issue list
    #[arg(long)]
    summary: bool,

    /// Reference date for overdue counts (defaults to today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    today: Option<NaiveDate>,

    /// Events CSV: type,book,user,issue,date
    ///
    /// Example: cargo run -- --books books.csv --users users.csv events.csv > issues.csv
    #[arg(value_name = "FILE")]
    events: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let policy = match load_policy(&args) {
        Ok(policy) => policy,
        Err(e) => {
            eprintln!("Error loading loan policy: {}", e);
            process::exit(1);
        }
    };
    let library = Library::with_policy(policy);

    run_step(&args.books, |reader| load_books(&library, reader));
    run_step(&args.users, |reader| load_users(&library, reader));
    run_step(&args.events, |reader| process_events(&library, reader));

    let result = if args.summary {
        let today = args.today.unwrap_or_else(|| Utc::now().date_naive());
        write_summary(&library, today, std::io::stdout())
    } else {
        write_issues(&library, std::io::stdout())
    };
    if let Err(e) = result {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Opens `path` and feeds it to one loading step, exiting on I/O or CSV failure.
fn run_step(path: &Path, step: impl FnOnce(BufReader<File>) -> Result<usize, csv::Error>) {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", path.display(), e);
            process::exit(1);
        }
    };
    match step(BufReader::new(file)) {
        Ok(count) => info!(path = %path.display(), count, "file processed"),
        Err(e) => {
            eprintln!("Error reading '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

/// Loads the policy file, if any, and applies command-line overrides.
fn load_policy(args: &Args) -> Result<LoanPolicy, ConfigError> {
    let mut policy = match &args.config {
        Some(path) => LoanPolicy::load(path)?,
        None => LoanPolicy::default(),
    };
    if let Some(days) = args.loan_days {
        policy.loan_period_days = days;
    }
    if let Some(rate) = args.fine_rate {
        policy.fine_rate_per_day = rate;
    }
    policy.validate()?;
    Ok(policy)
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader)
}

/// Raw CSV record for a catalog entry.
#[derive(Debug, Deserialize)]
struct BookRecord {
    title: String,
    author: Option<String>,
    isbn: Option<String>,
    total_copies: u32,
}

/// Adds every valid book row to the catalog, in file order.
///
/// Returns the number of books added. Rejected and malformed rows are
/// skipped and logged.
pub fn load_books<R: Read>(library: &Library, reader: R) -> Result<usize, csv::Error> {
    let mut added = 0;
    for result in csv_reader(reader).deserialize::<BookRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed book row: {}", e);
                continue;
            }
        };
        let details = BookDetails {
            title: record.title,
            author: record.author,
            isbn: record.isbn,
            total_copies: record.total_copies,
        };
        match library.add_book(details) {
            Ok(_) => added += 1,
            Err(e) => warn!("Skipping book: {}", e),
        }
    }
    Ok(added)
}

/// Raw CSV record for a user.
#[derive(Debug, Deserialize)]
struct UserRecord {
    name: String,
    email: Option<String>,
    status: Option<MembershipStatus>,
}

/// Registers every valid user row, in file order.
pub fn load_users<R: Read>(library: &Library, reader: R) -> Result<usize, csv::Error> {
    let mut added = 0;
    for result in csv_reader(reader).deserialize::<UserRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed user row: {}", e);
                continue;
            }
        };
        let details = UserDetails {
            name: record.name,
            email: record.email,
            status: record.status.unwrap_or_default(),
        };
        match library.add_user(details) {
            Ok(_) => added += 1,
            Err(e) => warn!("Skipping user: {}", e),
        }
    }
    Ok(added)
}

/// Raw CSV record matching the event format.
///
/// Fields: `type, book, user, issue, date`
#[derive(Debug, Deserialize)]
struct EventRecord {
    #[serde(rename = "type")]
    kind: String,
    book: Option<u32>,
    user: Option<u32>,
    issue: Option<u32>,
    date: NaiveDate,
}

#[derive(Debug, Clone, Copy)]
enum Event {
    Checkout {
        book_id: BookId,
        user_id: UserId,
        date: NaiveDate,
    },
    Return {
        issue_id: IssueId,
        date: NaiveDate,
    },
}

impl EventRecord {
    /// Converts the CSV record into an event.
    ///
    /// Returns `None` for unknown event types or missing required fields.
    fn into_event(self) -> Option<Event> {
        match self.kind.to_lowercase().as_str() {
            "checkout" | "issue" => Some(Event::Checkout {
                book_id: BookId(self.book?),
                user_id: UserId(self.user?),
                date: self.date,
            }),
            "return" => Some(Event::Return {
                issue_id: IssueId(self.issue?),
                date: self.date,
            }),
            _ => None,
        }
    }
}

/// Applies checkout and return events in file order.
///
/// Returns the number of events accepted. Rejected events (no copies left,
/// already returned, unknown IDs) are logged and skipped; they never stop
/// processing.
///
/// # CSV Format
///
/// ```csv
/// type,book,user,issue,date
/// checkout,1,1,,2024-03-01
/// return,,,1,2024-03-20
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_events<R: Read>(library: &Library, reader: R) -> Result<usize, csv::Error> {
    let mut accepted = 0;
    for result in csv_reader(reader).deserialize::<EventRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed event row: {}", e);
                continue;
            }
        };
        let Some(event) = record.into_event() else {
            warn!("Skipping invalid event record");
            continue;
        };

        let outcome = match event {
            Event::Checkout {
                book_id,
                user_id,
                date,
            } => library.checkout(book_id, user_id, date).map(|_| ()),
            Event::Return { issue_id, date } => library.return_book(issue_id, date).map(|_| ()),
        };
        match outcome {
            Ok(()) => accepted += 1,
            Err(e) => debug!("Skipping event {:?}: {}", event, e),
        }
    }
    Ok(accepted)
}

/// One output row per issue.
#[derive(Debug, Serialize)]
struct IssueRow {
    issue: IssueId,
    book: BookId,
    user: UserId,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    return_date: Option<NaiveDate>,
    fine: Option<Decimal>,
    status: IssueStatus,
}

/// Write every issue, in checkout order, to a CSV writer.
///
/// # CSV Format
///
/// ```csv
/// issue,book,user,issue_date,due_date,return_date,fine,status
/// 1,1,1,2024-03-01,2024-03-15,2024-03-20,5.00,closed
/// 2,1,2,2024-03-02,2024-03-16,,,open
/// ```
pub fn write_issues<W: Write>(library: &Library, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for issue in library.issues() {
        wtr.serialize(IssueRow {
            issue: issue.id(),
            book: issue.book_id(),
            user: issue.user_id(),
            issue_date: issue.issue_date(),
            due_date: issue.due_date(),
            return_date: issue.return_date(),
            fine: issue.fine().map(|fine| fine.round_dp(2)),
            status: issue.status(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the report summary as of `today` as a single CSV row.
pub fn write_summary<W: Write>(
    library: &Library,
    today: NaiveDate,
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    wtr.serialize(library.report_summary(today))?;
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    const BOOKS: &str = "title,author,isbn,total_copies\n\
                         Clean Code,Robert C. Martin,9780132350884,3\n\
                         Introduction to Algorithms,Cormen et al,9780262033848,2\n";
    const USERS: &str = "name,email,status\n\
                         Alice,alice@example.org,active\n\
                         Bob,,inactive\n\
                         Charlie,,\n";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded() -> Library {
        let library = Library::new();
        load_books(&library, Cursor::new(BOOKS)).unwrap();
        load_users(&library, Cursor::new(USERS)).unwrap();
        library
    }

    #[test]
    fn load_books_in_file_order() {
        let library = Library::new();
        let added = load_books(&library, Cursor::new(BOOKS)).unwrap();
        assert_eq!(added, 2);

        let book = library.get_book(BookId(2)).unwrap();
        assert_eq!(book.title, "Introduction to Algorithms");
        assert_eq!(book.available_copies, 2);
    }

    #[test]
    fn load_users_defaults_blank_status_to_active() {
        let library = seeded();
        assert_eq!(library.users().len(), 3);
        assert_eq!(library.get_user(UserId(2)).unwrap().status, MembershipStatus::Inactive);
        assert_eq!(library.get_user(UserId(3)).unwrap().status, MembershipStatus::Active);
        assert_eq!(library.get_user(UserId(3)).unwrap().email, None);
    }

    #[test]
    fn skip_malformed_book_rows() {
        let csv = "title,author,isbn,total_copies\n\
                   Good,,,1\n\
                   Bad,,,many\n\
                   ,,,2\n\
                   Also Good,,,1\n";
        let library = Library::new();
        let added = load_books(&library, Cursor::new(csv)).unwrap();
        assert_eq!(added, 2);
    }

    #[test]
    fn checkout_and_return_events() {
        let library = seeded();
        let events = "type,book,user,issue,date\n\
                      checkout,1,1,,2024-03-01\n\
                      return,,,1,2024-03-20\n";
        let accepted = process_events(&library, Cursor::new(events)).unwrap();
        assert_eq!(accepted, 2);

        let issue = library.get_issue(IssueId(1)).unwrap();
        assert_eq!(issue.fine(), Some(dec!(5)));
        assert_eq!(library.get_book(BookId(1)).unwrap().available_copies, 3);
    }

    #[test]
    fn rejected_events_are_skipped() {
        let library = seeded();
        let events = "type,book,user,issue,date\n\
                      checkout,1,2,,2024-03-01\n\
                      checkout,9,1,,2024-03-01\n\
                      return,,,7,2024-03-01\n\
                      renew,1,1,,2024-03-01\n\
                      checkout,1,1,,not-a-date\n\
                      checkout,1,1,,2024-03-02\n";
        let accepted = process_events(&library, Cursor::new(events)).unwrap();
        assert_eq!(accepted, 1);
        assert_eq!(library.issues().len(), 1);
    }

    #[test]
    fn write_issues_to_csv() {
        let library = seeded();
        let events = "type,book,user,issue,date\n\
                      checkout,1,1,,2024-03-01\n\
                      checkout,2,3,,2024-03-02\n\
                      return,,,1,2024-03-20\n";
        process_events(&library, Cursor::new(events)).unwrap();

        let mut output = Vec::new();
        write_issues(&library, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();

        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some("issue,book,user,issue_date,due_date,return_date,fine,status")
        );
        assert_eq!(
            lines.next(),
            Some("1,1,1,2024-03-01,2024-03-15,2024-03-20,5.00,closed")
        );
        assert_eq!(lines.next(), Some("2,2,3,2024-03-02,2024-03-16,,,open"));
    }

    #[test]
    fn write_summary_counts_overdue() {
        let library = seeded();
        let events = "type,book,user,issue,date\n\
                      checkout,1,1,,2024-03-01\n\
                      checkout,2,3,,2024-03-02\n\
                      return,,,1,2024-03-20\n";
        process_events(&library, Cursor::new(events)).unwrap();

        let mut output = Vec::new();
        write_summary(&library, date(2024, 3, 25), &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains("total_books,total_users,active_issues,overdue_count,fines_collected"));
        assert!(output.contains("2,3,1,1,5.00"));
    }
}
