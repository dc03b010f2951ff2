// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Generates pseudo-random rows covering every column type and writes the
//! encoded chunks to a file.
//!
//! Each chunk is framed as `[u64 LE row count][u32 LE byte length][chunk]`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hb_inserter::config::{DEFAULT_CHUNK_SIZE, DEFAULT_INITIAL_CAPACITY};
use hb_inserter::{ChunkTransport, Inserter, InserterConfig, StaticHeader};
use hb_repr::adt::datetime::{
    Date, Time, Timestamp, TimestampTz, MICROS_PER_DAY, UNIX_EPOCH_DAY_NUMBER,
};
use hb_repr::adt::interval::Interval;
use hb_repr::adt::numeric::{Numeric, NumericType};
use hb_repr::{RelationDesc, ScalarType};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Magic bytes written at the start of every chunk.
const CHUNK_HEADER: &[u8] = b"HBCHUNK\x01";

#[derive(Parser, Debug)]
#[clap(name = "hb-datagen", next_line_help = true)]
struct Args {
    /// The number of rows to generate.
    #[clap(long, env = "HB_ROWS", default_value = "1000")]
    rows: u64,
    /// The file to write framed chunks to.
    #[clap(long, env = "HB_OUTPUT", value_name = "PATH")]
    output: PathBuf,
    /// Seed for the random number generator. Random if unset.
    #[clap(long, env = "HB_SEED")]
    seed: Option<u64>,
    /// Bytes reserved up front for each chunk.
    #[clap(long, env = "HB_INITIAL_CAPACITY", default_value_t = DEFAULT_INITIAL_CAPACITY)]
    initial_capacity: usize,
    /// The chunk size at which rows are written out.
    #[clap(long, env = "HB_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
    /// Which log messages to emit, in `tracing_subscriber` filter syntax.
    #[clap(long, env = "HB_LOG_FILTER", default_value = "info")]
    log_filter: String,
}

fn main() {
    let args = Args::parse();

    let filter = match EnvFilter::try_new(&args.log_filter) {
        Ok(filter) => filter,
        Err(err) => {
            eprintln!("hb-datagen: invalid --log-filter: {err}");
            process::exit(2);
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(args) {
        error!("hb-datagen: {err:#}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), anyhow::Error> {
    let config = InserterConfig {
        initial_capacity: args.initial_capacity,
        chunk_size: args.chunk_size,
    };
    let seed = args.seed.unwrap_or_else(rand::random);
    info!("generating {} rows with seed {}", args.rows, seed);

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut transport = FramedTransport::new(BufWriter::new(file));
    let mut rng = StdRng::seed_from_u64(seed);
    let rows = generate(&mut rng, args.rows, &mut transport, config)?;
    let bytes = transport.bytes_written;
    transport
        .into_inner()
        .flush()
        .with_context(|| format!("flushing {}", args.output.display()))?;

    info!(
        "wrote {} rows in {} bytes to {}",
        rows,
        bytes,
        args.output.display()
    );
    Ok(())
}

/// A [`ChunkTransport`] that writes length-framed chunks to a stream.
#[derive(Debug)]
struct FramedTransport<W> {
    inner: W,
    chunks: u64,
    bytes_written: u64,
}

impl<W: Write> FramedTransport<W> {
    fn new(inner: W) -> FramedTransport<W> {
        FramedTransport {
            inner,
            chunks: 0,
            bytes_written: 0,
        }
    }

    fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ChunkTransport for FramedTransport<W> {
    fn send_chunk(&mut self, chunk: &[u8], rows: u64) -> Result<(), anyhow::Error> {
        let len = u32::try_from(chunk.len()).context("chunk length exceeds u32")?;
        self.inner.write_all(&rows.to_le_bytes())?;
        self.inner.write_all(&len.to_le_bytes())?;
        self.inner.write_all(chunk)?;
        self.chunks += 1;
        self.bytes_written += 12 + u64::from(len);
        debug!("wrote chunk {} with {} rows", self.chunks, rows);
        Ok(())
    }
}

/// The demo table, with one column of each supported type.
fn demo_desc() -> Result<RelationDesc, anyhow::Error> {
    Ok(RelationDesc::empty()
        .with_column("id", ScalarType::Int64.nullable(false))
        .with_column("active", ScalarType::Bool.nullable(true))
        .with_column("category", ScalarType::Int16.nullable(false))
        .with_column("quantity", ScalarType::Int32.nullable(false))
        .with_column("owner", ScalarType::Oid.nullable(false))
        .with_column(
            "price",
            ScalarType::Numeric(NumericType::new(12, 2)?).nullable(false),
        )
        .with_column(
            "total",
            ScalarType::Numeric(NumericType::new(38, 6)?).nullable(true),
        )
        .with_column("score", ScalarType::Float64.nullable(false))
        .with_column("name", ScalarType::String.nullable(false))
        .with_column(
            "note",
            ScalarType::VarChar {
                max_length: Some(64),
            }
            .nullable(true),
        )
        .with_column("payload", ScalarType::Bytes.nullable(true))
        .with_column("day", ScalarType::Date.nullable(false))
        .with_column("at", ScalarType::Time.nullable(false))
        .with_column("created", ScalarType::Timestamp.nullable(false))
        .with_column("updated", ScalarType::TimestampTz.nullable(true))
        .with_column("ttl", ScalarType::Interval.nullable(false)))
}

/// Generates `count` rows of the demo table and sends them through
/// `transport`, returning the number of rows inserted.
fn generate<R: Rng, T: ChunkTransport>(
    rng: &mut R,
    count: u64,
    transport: T,
    config: InserterConfig,
) -> Result<u64, anyhow::Error> {
    let header = Arc::new(StaticHeader::new(CHUNK_HEADER));
    let mut inserter = Inserter::new(demo_desc()?, header, transport, config)?;
    for id in 0..count {
        let id = i64::try_from(id)?;
        inserter.add_i64(id)?;
        if rng.gen_bool(0.1) {
            inserter.add_null()?;
        } else {
            inserter.add_bool(rng.gen())?;
        }
        inserter.add_i16(rng.gen_range(0..100))?;
        inserter.add_i32(rng.gen_range(1..10_000))?;
        inserter.add_oid(rng.gen())?;
        inserter.add_numeric(&Numeric::new(rng.gen_range(0..10_000_000_000i64).into(), 2))?;
        if rng.gen_bool(0.1) {
            inserter.add_null()?;
        } else {
            let cents: i128 = rng.gen_range(-(10i128.pow(30))..10i128.pow(30));
            inserter.add_numeric(&Numeric::new(cents.into(), 6))?;
        }
        inserter.add_f64(rng.gen())?;

        let len = rng.gen_range(1..24);
        let name: String = (&mut *rng)
            .sample_iter(Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        inserter.add_text(&name)?;
        if rng.gen_bool(0.2) {
            inserter.add_null()?;
        } else {
            let note: Vec<u16> = format!("note #{id} für {name} ✓").encode_utf16().collect();
            inserter.add_utf16(&note, 0, note.len())?;
        }
        if rng.gen_bool(0.5) {
            inserter.add_null()?;
        } else {
            let payload: Vec<u8> = (0..rng.gen_range(0..32)).map(|_| rng.gen()).collect();
            inserter.add_bytes(&payload)?;
        }

        let day = Date::from_day_number(UNIX_EPOCH_DAY_NUMBER + rng.gen_range(0..47_482));
        let time = Time::from_micros(rng.gen_range(0..MICROS_PER_DAY))?;
        let created = Timestamp::new(day, time)?;
        inserter.add_date(day)?;
        inserter.add_time(time)?;
        inserter.add_timestamp(created)?;
        if rng.gen_bool(0.3) {
            inserter.add_null()?;
        } else {
            inserter.add_timestamp_tz(TimestampTz(created))?;
        }
        inserter.add_interval(Interval::new(
            rng.gen_range(0..24),
            rng.gen_range(0..31),
            rng.gen_range(0..MICROS_PER_DAY).try_into()?,
        ))?;
        inserter.end_row()?;
    }
    Ok(inserter.execute()?)
}
