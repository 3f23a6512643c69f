//! Prints the next times a cron expression matches in the local time zone

use chrono::Local;
use sundial::CronIter;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let count = args
        .get(2)
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(10);

    match args.get(1).map(|expr| CronIter::new(expr, Local::now())).transpose() {
        Ok(Some(iter)) => {
            let cron = iter.cron().clone();
            let mut printed = 0;
            for time in iter.take(count) {
                if !cron.contains(&time) {
                    println!("Failed check! Cron does not contain {}.", time);
                    break;
                }
                println!("{}", time.format("%F %T %:z"));
                printed += 1;
            }
            if printed == 0 {
                println!("Cron doesn't match any time within a year!");
            }
        }
        Ok(None) => println!("Usage: cargo run --example next-times -- \"[cron expression]\" [count]"),
        Err(err) => println!("{}", err),
    }
}
