// RustyDB core - standalone smoke-test binary.
//
// Wires the four core subsystems (disk manager, buffer pool, log manager,
// transaction/lock manager) over the configured data and log directories,
// runs recovery, and reports the resulting configuration. Query planning,
// the network listener, and the catalog are out of scope for this crate
// and are not started here.

use rustydb_core::{Database, DbConfig, Result, VERSION};
use tracing::{error, info};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    print_banner();

    let install_dir = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));

    let mut config = DbConfig::default();
    config.data_dir = install_dir.join("data").display().to_string();
    config.log_dir = install_dir.join("wal").display().to_string();

    print_startup_info(&install_dir.display().to_string(), &config);

    info!("opening rustydb-core (version {VERSION})");
    let db = match Database::open(config) {
        Ok(db) => db,
        Err(e) => {
            error!("failed to open database: {e}");
            return Err(e);
        }
    };
    info!("recovery complete; buffer pool has {} frames", db.buffer_pool().pool_size());

    print_runtime_summary(&db);

    // Smoke-test the four subsystems end to end: begin a transaction,
    // allocate a page through the buffer pool, stamp its LSN from an
    // INSERT record, commit, and checkpoint.
    smoke_test(&db)?;
    print_stats(&db);

    info!("shutdown complete");
    Ok(())
}

fn smoke_test(db: &rustydb_core::Database) -> Result<()> {
    use rustydb_core::common::RecordId;
    use rustydb_core::wal::LogRecord;

    let txn = db.begin()?;
    let (page_id, frame_id) = db.buffer_pool().new_page()?;
    let rid = RecordId::new(page_id, 0);
    let value = b"rustydb".to_vec();

    let lsn = db
        .log_manager()
        .append(LogRecord::insert(txn.id, txn.prev_lsn(), rid, value.clone()))?;
    {
        let mut bytes = db.buffer_pool().frame(frame_id).write();
        bytes[0..value.len()].copy_from_slice(&value);
    }
    db.buffer_pool().set_page_lsn(page_id, lsn)?;
    txn.set_prev_lsn(lsn);
    db.buffer_pool().unpin_page(page_id, true)?;

    db.commit(&txn)?;
    db.checkpoint()?;

    info!("smoke test ok: txn {} committed, page {} durable at lsn {}", txn.id, page_id, lsn);
    Ok(())
}

fn print_banner() {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              RustyDB Core - storage engine                 ║");
    println!("║                      version {:<10}              ║", VERSION);
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
}

fn print_startup_info(install_dir: &str, config: &DbConfig) {
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ STARTUP CONFIGURATION                                       │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ Installation Directory: {:<37} │", install_dir);
    println!("│ Data Directory:         {:<37} │", config.data_dir);
    println!("│ Log Directory:          {:<37} │", config.log_dir);
    println!("│ Page Size:              {:<37} │", format!("{} bytes", rustydb_core::config::page_size()));
    println!("│ Buffer Pool Size:       {:<37} │", format!("{} pages", config.pool_size));
    println!("│ Lock Timeout:           {:<37} │", format!("{:?}", config.lock_timeout));
    println!("│ Logging Enabled:        {:<37} │", config.enable_logging);
    println!("└─────────────────────────────────────────────────────────────┘");
    println!();
}

fn print_stats(db: &rustydb_core::Database) {
    use std::sync::atomic::Ordering;
    let stats = db.stats();
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ STATISTICS                                                  │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ Pages read:             {:<37} │", stats.pages_read.load(Ordering::Relaxed));
    println!("│ Pages written:          {:<37} │", stats.pages_written.load(Ordering::Relaxed));
    println!("│ Log flushes:            {:<37} │", stats.log_flushes.load(Ordering::Relaxed));
    println!("│ Lock waits:             {:<37} │", stats.lock_waits.load(Ordering::Relaxed));
    println!("│ Lock timeouts:          {:<37} │", stats.lock_timeouts.load(Ordering::Relaxed));
    println!("│ Transactions committed: {:<37} │", stats.txns_committed.load(Ordering::Relaxed));
    println!("│ Transactions aborted:   {:<37} │", stats.txns_aborted.load(Ordering::Relaxed));
    println!("└─────────────────────────────────────────────────────────────┘");
    println!();
}

fn print_runtime_summary(db: &rustydb_core::Database) {
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ CORE SUBSYSTEMS                                             │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│   [ok] disk manager    - page-granular file I/O             │");
    println!("│   [ok] buffer pool     - {:<37} │", format!("{} frames", db.buffer_pool().pool_size()));
    println!("│   [ok] log manager     - {:<37} │", format!("persistent LSN {}", db.log_manager().persistent_lsn()));
    println!("│   [ok] recovery        - analysis/redo/undo on open         │");
    println!("│   [ok] lock manager    - strict 2PL, S/X with upgrade       │");
    println!("│   [ok] transaction mgr - {:<37} │", format!("{} active", db.transaction_manager().active_count()));
    println!("└─────────────────────────────────────────────────────────────┘");
    println!();
}
