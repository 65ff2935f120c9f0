use chrono::NaiveDate;
use clap::Parser;
use log::{info, warn, LevelFilter};
use mortgage_advisor::advisor::{
    format_prompt, get_advice, GeminiAdvisor, GeminiConfig, MortgageSummary, DEFAULT_MODEL,
};
use mortgage_advisor::charts::{balance_series, ChartRenderer, PaymentBreakdown, TextChart};
use mortgage_advisor::loan::{payment_dates, round, AmortizationResult};
use mortgage_advisor::{LoanTerms, MortgageError};
use simple_logger::SimpleLogger;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

/// Loan terms offered on the form.
const TERM_CHOICES: [u32; 3] = [15, 20, 30];
/// Highest annual rate the form accepts.
const MAX_RATE_PERCENT: f64 = 100.;

#[derive(Debug, Parser)]
#[command(
    name = "mortgage-advisor",
    version,
    about = "Monthly payment, amortization charts and AI advice for a fixed-rate mortgage"
)]
struct Args {
    /// Home price ($)
    #[arg(long, default_value_t = 500000.)]
    home_price: f64,
    /// Down payment ($)
    #[arg(long, default_value_t = 100000.)]
    down_payment: f64,
    /// Annual interest rate (%)
    #[arg(long, default_value_t = 6.5)]
    rate: f64,
    /// Loan term in years (15, 20 or 30)
    #[arg(long, default_value_t = 15, value_parser = parse_term)]
    term: u32,
    /// Question about your mortgage
    #[arg(long, short, default_value = "")]
    question: String,
    /// Date of the first payment (YYYY-MM-DD), adds due dates to the schedule
    #[arg(long)]
    first_payment: Option<NaiveDate>,
    /// Print every period of the schedule
    #[arg(long)]
    schedule: bool,
    /// Write the schedule to a CSV file
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Skip the advisor call
    #[arg(long)]
    no_advice: bool,
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    model: String,
    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_term(value: &str) -> Result<u32, String> {
    let years: u32 = value.parse().map_err(|_| format!("`{value}` is not a number of years"))?;
    if TERM_CHOICES.contains(&years) {
        Ok(years)
    } else {
        Err(format!("loan term must be one of {TERM_CHOICES:?}"))
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let level = LevelFilter::from_str(&args.log_level)
        .map_err(|_| format!("unknown log level `{}`", args.log_level))?;
    SimpleLogger::new().with_level(level).init()?;

    let terms = collect_terms(&args)?;
    let result = terms.amortize();
    info!(
        "loan {:.2} at {}% over {} years: {} payments",
        terms.principal(),
        terms.annual_rate_percent(),
        terms.term_years(),
        result.len()
    );
    if result.is_negatively_amortizing() {
        warn!("payment does not cover the interest, the balance grows every month");
    } else if result.final_balance() > 0.005 {
        warn!(
            "schedule ends with ${:.2} still owed after {} payments",
            result.final_balance(),
            result.len()
        );
    }

    println!("Estimated Monthly Payment: ${:.2}", result.payment());
    println!();

    let renderer = TextChart::default();
    println!("{}", renderer.breakdown(&PaymentBreakdown::from_schedule(&result)));
    println!("{}", renderer.balance(&balance_series(&result)));

    let dates = match args.first_payment {
        Some(first) => Some(payment_dates(first, result.len())?),
        None => None,
    };

    if args.schedule {
        for (i, period) in result.periods().iter().enumerate() {
            match &dates {
                Some(dates) => println!("{} {}", dates[i], period),
                None => println!("{period}"),
            }
        }
        println!();
    }

    if let Some(path) = &args.csv {
        write_csv(path, &result, dates.as_deref())?;
        info!("schedule written to {}", path.display());
    }

    if !args.no_advice {
        let summary = MortgageSummary::new(args.home_price, args.down_payment, &terms, &result);
        let prompt = format_prompt(&summary, &args.question);

        println!("AI Mortgage Advice");
        let advice = match GeminiAdvisor::new(GeminiConfig {
            api_key: args.api_key.clone(),
            model: args.model.clone(),
            ..GeminiConfig::default()
        }) {
            Ok(advisor) => get_advice(&advisor, &prompt),
            Err(err) => format!("Error: {err}"),
        };
        println!("{advice}");
    }

    Ok(())
}

fn collect_terms(args: &Args) -> Result<LoanTerms, MortgageError> {
    if !args.home_price.is_finite() || args.home_price <= 0. {
        return Err(MortgageError::InvalidInput {
            field: "home_price".to_string(),
            reason: "home price must be greater than zero".to_string(),
        });
    }
    if !args.down_payment.is_finite() || args.down_payment < 0. {
        return Err(MortgageError::InvalidInput {
            field: "down_payment".to_string(),
            reason: "down payment cannot be negative".to_string(),
        });
    }
    if args.down_payment >= args.home_price {
        return Err(MortgageError::InvalidInput {
            field: "down_payment".to_string(),
            reason: "down payment must be less than the home price".to_string(),
        });
    }
    if args.rate > MAX_RATE_PERCENT {
        return Err(MortgageError::InvalidInput {
            field: "rate".to_string(),
            reason: format!("interest rate cannot exceed {MAX_RATE_PERCENT}%"),
        });
    }
    LoanTerms::new(args.home_price - args.down_payment, args.rate, args.term)
}

fn write_csv(
    path: &Path,
    result: &AmortizationResult,
    dates: Option<&[NaiveDate]>,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec!["month"];
    if dates.is_some() {
        header.push("date");
    }
    header.extend(["payment", "principal", "interest", "balance"]);
    wtr.write_record(&header)?;

    for (i, period) in result.periods().iter().enumerate() {
        let mut row = vec![period.index.to_string()];
        if let Some(dates) = dates {
            row.push(dates[i].to_string());
        }
        row.extend(
            [
                period.payment(),
                period.principal_portion,
                period.interest_portion,
                period.remaining_balance,
            ]
            .map(|amt| round(amt, 4).to_string()),
        );
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}
