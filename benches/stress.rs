use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate, Utc};
use tokio_postgres::{Client, Config, NoTls};
use ulid::Ulid;

async fn connect(host: &str, port: u16) -> Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname("farmstay")
        .user("farmstay")
        .password(std::env::var("FARMSTAY_PASSWORD").unwrap_or_else(|_| "farmstay".into()));

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

/// First check-in day used by the benchmark, well clear of "today".
fn base_date() -> NaiveDate {
    Utc::now().date_naive() + Days::new(7)
}

/// Two-night stay number `i`, with a free day between stays so no two touch.
fn stay(i: u64) -> (NaiveDate, NaiveDate) {
    let start = base_date() + Days::new(3 * i);
    (start, start + Days::new(2))
}

async fn create_farm(client: &Client) -> Ulid {
    let id = Ulid::new();
    client
        .batch_execute(&format!(
            "INSERT INTO farms (id, title, location, nightly_rate, capacity) \
             VALUES ('{id}', 'Bench Farm', 'Coorg', 4500, 8)"
        ))
        .await
        .unwrap();
    id
}

fn booking_sql(farm: Ulid, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "INSERT INTO reservations (id, farm_id, guest_id, start, \"end\", guests, guest_name, guest_contact) \
         VALUES ('{}', '{farm}', '{}', '{start}', '{end}', 2, 'Bench Guest', 'bench@example.com')",
        Ulid::new(),
        Ulid::new()
    )
}

async fn phase1_sequential(host: &str, port: u16) {
    let client = connect(host, port).await;
    let farm = create_farm(&client).await;

    let n = 100;
    let mut latencies = Vec::with_capacity(n as usize);
    let start = Instant::now();
    for i in 0..n {
        let (s, e) = stay(i);
        let t = Instant::now();
        client.batch_execute(&booking_sql(farm, s, e)).await.unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

async fn phase2_concurrent_farms(host: &str, port: u16) {
    let n_tasks = 10;
    let n_per_task = 100;

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..n_tasks {
        let host = host.to_string();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let farm = create_farm(&client).await;
            for i in 0..n_per_task {
                let (s, e) = stay(i);
                client.batch_execute(&booking_sql(farm, s, e)).await.unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} farms x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_contended_dates(host: &str, port: u16) {
    let setup = connect(host, port).await;
    let farm = create_farm(&setup).await;
    let rounds = 20;
    let contenders = 16;
    let won = Arc::new(AtomicUsize::new(0));
    let conflicts = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    for round in 0..rounds {
        let (s, e) = stay(round);
        let mut handles = Vec::new();
        for _ in 0..contenders {
            let host = host.to_string();
            let won = won.clone();
            let conflicts = conflicts.clone();
            handles.push(tokio::spawn(async move {
                let client = connect(&host, port).await;
                match client.batch_execute(&booking_sql(farm, s, e)).await {
                    Ok(()) => won.fetch_add(1, Ordering::Relaxed),
                    Err(_) => conflicts.fetch_add(1, Ordering::Relaxed),
                };
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }

    let won = won.load(Ordering::Relaxed);
    println!(
        "  {rounds} rounds x {contenders} contenders in {:.2}s: {won} won, {} refused",
        start.elapsed().as_secs_f64(),
        conflicts.load(Ordering::Relaxed)
    );
    assert_eq!(won, rounds as usize, "exactly one winner per date range");
}

async fn phase4_read_under_load(host: &str, port: u16) {
    let setup = connect(host, port).await;
    let farm = create_farm(&setup).await;

    let writer = {
        let host = host.to_string();
        tokio::spawn(async move {
            let client = connect(&host, port).await;
            for i in 0..200 {
                let (s, e) = stay(i);
                let _ = client.batch_execute(&booking_sql(farm, s, e)).await;
            }
        })
    };

    let reader = connect(host, port).await;
    let mut latencies = Vec::new();
    while !writer.is_finished() {
        let t = Instant::now();
        reader
            .simple_query(&format!("SELECT * FROM availability WHERE farm_id = '{farm}'"))
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }
    writer.await.unwrap();
    print_latency("availability latency", &mut latencies);
}

async fn phase5_connection_storm(host: &str, port: u16) {
    let n_conns = 50;
    let ops_per_conn = 10;

    let start = Instant::now();
    let success = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for _ in 0..n_conns {
        let host = host.to_string();
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let farm = create_farm(&client).await;
            for i in 0..ops_per_conn {
                let (s, e) = stay(i);
                client.batch_execute(&booking_sql(farm, s, e)).await.unwrap();
            }
            success.fetch_add(1, Ordering::Relaxed);
        }));
    }
    for h in handles {
        let _ = h.await;
    }

    let ok = success.load(Ordering::Relaxed);
    println!(
        "  {n_conns} connections, {ops_per_conn} bookings each: {ok}/{n_conns} succeeded in {:.2}s",
        start.elapsed().as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let host = std::env::var("FARMSTAY_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("FARMSTAY_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid FARMSTAY_PORT");

    println!("=== farmstay stress benchmark ===");
    println!("target: {host}:{port}\n");

    println!("[phase 1] sequential bookings on one farm");
    phase1_sequential(&host, port).await;

    println!("\n[phase 2] concurrent bookings across farms");
    phase2_concurrent_farms(&host, port).await;

    println!("\n[phase 3] contended dates");
    phase3_contended_dates(&host, port).await;

    println!("\n[phase 4] availability reads under write load");
    phase4_read_under_load(&host, port).await;

    println!("\n[phase 5] connection storm");
    phase5_connection_storm(&host, port).await;

    println!("\n=== benchmark complete ===");
}
