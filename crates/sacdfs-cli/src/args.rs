/*
    sacdfs-cli
    https://github.com/dbalsom/sacdfs

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/
use std::{
    fmt::{Display, Formatter},
    path::PathBuf,
};

use bpaf::*;
use sacdfs::AudioArea;

#[derive(Clone, Debug)]
pub(crate) enum Command {
    Tree(TreeParams),
    Dump(DumpParams),
    Id3(Id3Params),
    Bench(BenchParams),
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Tree(_) => write!(f, "tree"),
            Command::Dump(_) => write!(f, "dump"),
            Command::Id3(_) => write!(f, "id3"),
            Command::Bench(_) => write!(f, "bench"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct AppParams {
    pub global: GlobalOptions,
    pub command: Command,
}

#[derive(Debug)]
pub struct GlobalOptions {
    pub verbose: bool,
    pub idle_timeout_secs: u64,
}

pub fn global_options_parser() -> impl Parser<GlobalOptions> {
    let verbose = long("verbose").short('v').help("Enable debug logging").switch();
    let idle_timeout_secs = long("idle-timeout")
        .help("Seconds an unreferenced ISO mount may sit idle before the overlay layer closes it")
        .argument::<u64>("SECS")
        .fallback(300);
    construct!(GlobalOptions { verbose, idle_timeout_secs })
}

fn synthetic_parser() -> impl Parser<bool> {
    long("synthetic")
        .help("Use a procedurally generated fixture disc instead of opening a real ISO path")
        .switch()
}

fn workers_parser() -> impl Parser<usize> {
    long("workers")
        .help("Worker thread count for the MT DST pipeline (0 disables it)")
        .argument::<usize>("N")
        .fallback(num_cpus::get())
}

pub(crate) fn area_parser() -> impl Parser<AudioArea> {
    long("area")
        .help("stereo or multichannel")
        .argument::<String>("AREA")
        .parse(|s| match s.to_lowercase().as_str() {
            "stereo" => Ok(AudioArea::Stereo),
            "multichannel" | "multi-channel" => Ok(AudioArea::MultiChannel),
            other => Err(format!("unknown area '{other}', expected stereo or multichannel")),
        })
}

#[derive(Clone, Debug)]
pub(crate) struct TreeParams {
    pub in_file: PathBuf,
    pub synthetic: bool,
}

fn tree_parser() -> impl Parser<Command> {
    let in_file = long("in_file").short('i').argument::<PathBuf>("ISO").fallback(PathBuf::new());
    let synthetic = synthetic_parser();
    construct!(TreeParams { in_file, synthetic }).map(Command::Tree)
}

#[derive(Clone, Debug)]
pub(crate) struct DumpParams {
    pub in_file: PathBuf,
    pub synthetic: bool,
    pub area: AudioArea,
    pub track: u8,
    pub out_file: PathBuf,
    pub workers: usize,
}

fn dump_parser() -> impl Parser<Command> {
    let in_file = long("in_file").short('i').argument::<PathBuf>("ISO").fallback(PathBuf::new());
    let synthetic = synthetic_parser();
    let area = area_parser();
    let track = long("track").argument::<u8>("N");
    let out_file = long("out_file").short('o').argument::<PathBuf>("FILE");
    let workers = workers_parser();
    construct!(DumpParams { in_file, synthetic, area, track, out_file, workers }).map(Command::Dump)
}

#[derive(Clone, Debug)]
pub(crate) enum Id3Action {
    Get,
    Set(PathBuf),
    Clear,
}

#[derive(Clone, Debug)]
pub(crate) struct Id3Params {
    pub in_file: PathBuf,
    pub synthetic: bool,
    pub area: AudioArea,
    pub track: u8,
    pub action: Id3Action,
}

fn id3_parser() -> impl Parser<Command> {
    let in_file = long("in_file").short('i').argument::<PathBuf>("ISO").fallback(PathBuf::new());
    let synthetic = synthetic_parser();
    let area = area_parser();
    let track = long("track").argument::<u8>("N");
    let set_from = long("set").help("Write the ID3 tag from this file's bytes").argument::<PathBuf>("FILE").optional();
    let clear = long("clear").help("Clear the cached tag, forcing regeneration").switch();

    construct!(in_file, synthetic, area, track, set_from, clear).map(
        |(in_file, synthetic, area, track, set_from, clear)| {
            let action = if clear {
                Id3Action::Clear
            } else if let Some(path) = set_from {
                Id3Action::Set(path)
            } else {
                Id3Action::Get
            };
            Command::Id3(Id3Params { in_file, synthetic, area, track, action })
        },
    )
}

#[derive(Clone, Debug)]
pub(crate) struct BenchParams {
    pub in_file: PathBuf,
    pub synthetic: bool,
    pub area: AudioArea,
    pub workers: usize,
}

fn bench_parser() -> impl Parser<Command> {
    let in_file = long("in_file").short('i').argument::<PathBuf>("ISO").fallback(PathBuf::new());
    let synthetic = synthetic_parser();
    let area = area_parser();
    let workers = workers_parser();
    construct!(BenchParams { in_file, synthetic, area, workers }).map(Command::Bench)
}

pub(crate) fn app_params() -> OptionParser<AppParams> {
    let global = global_options_parser();

    let tree = tree_parser().to_options().command("tree").help("Print the virtual directory tree");
    let dump = dump_parser().to_options().command("dump").help("Read a virtual track end-to-end into a file");
    let id3 = id3_parser().to_options().command("id3").help("Inspect or override a track's ID3 overlay");
    let bench = bench_parser().to_options().command("bench").help("Benchmark the MT DST pipeline");

    let command = construct!([tree, dump, id3, bench]);
    construct!(AppParams { global, command })
        .to_options()
        .descr("sacdfs-cli: inspect SACD ISOs through the sacdfs virtual filesystem")
}
