//! Synthetic process tables.
//!
//! Builds fixture process tables in either on-disk format together with an
//! [`Expected`] manifest holding the totals every metric must produce. Used by
//! the `generate-fixture` and `test --expect` commands and by the test suites.

use crate::aggregate::Metric;
use crate::process::perms::mflags;
use crate::process::prmap::PrMap;
use crate::process::psinfo::PsInfo;
use crate::process::PermissionSet;
use anyhow::{Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Manifest format version.
pub const FIXTURE_VERSION: &str = "1.0";

/// Manifest file name inside a generated fixture directory.
pub const EXPECTED_FILE: &str = "expected.json";

/// First pid handed out by the generator.
const FIRST_PID: i32 = 1000;

/// Base address of generated mappings.
const MAP_BASE: u64 = 0x5555_0000_0000;

/// Permission mixes the generator draws from.
const REGION_KINDS: [(bool, bool, bool, bool); 6] = [
    // (read, write, exec, shared)
    (true, false, false, false),
    (true, true, false, false),
    (true, false, true, false),
    (true, true, false, true),
    (true, false, false, true),
    (false, false, false, false),
];

/// One mapping of a fixture process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureRegion {
    pub start: u64,
    pub size: u64,
    pub perms: PermissionSet,
}

impl FixtureRegion {
    pub fn new(start: u64, size: u64, readable: bool, writable: bool, shared: bool) -> Self {
        Self {
            start,
            size,
            perms: PermissionSet {
                readable,
                writable,
                executable: false,
                shared,
                private: !shared,
            },
        }
    }

    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }
}

/// One process of a fixture table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureProcess {
    pub pid: i32,
    pub name: String,
    pub resident_pages: u64,
    pub regions: Vec<FixtureRegion>,
}

impl FixtureProcess {
    pub fn new(pid: i32, name: impl Into<String>, resident_pages: u64) -> Self {
        Self {
            pid,
            name: name.into(),
            resident_pages,
            regions: Vec::new(),
        }
    }

    pub fn with_region(mut self, region: FixtureRegion) -> Self {
        self.regions.push(region);
        self
    }

    /// Bytes this process contributes to `metric`.
    pub fn metric_bytes(&self, metric: Metric, page_size: u64) -> u64 {
        if !metric.is_mapping() {
            return self.resident_pages.saturating_mul(page_size);
        }
        self.regions
            .iter()
            .filter(|r| metric.counts(&r.perms))
            .map(|r| r.size)
            .fold(0, u64::saturating_add)
    }
}

/// Text permission column for `perms`, e.g. `rw-p`.
pub fn perms_token(perms: &PermissionSet) -> String {
    let mut token = String::with_capacity(4);
    token.push(if perms.readable { 'r' } else { '-' });
    token.push(if perms.writable { 'w' } else { '-' });
    token.push(if perms.executable { 'x' } else { '-' });
    token.push(if perms.shared { 's' } else { 'p' });
    token
}

/// `pr_mflags` word for `perms`.
pub fn perms_mflags(perms: &PermissionSet) -> u32 {
    let mut flags = 0;
    if perms.readable {
        flags |= mflags::MA_READ;
    }
    if perms.writable {
        flags |= mflags::MA_WRITE;
    }
    if perms.executable {
        flags |= mflags::MA_EXEC;
    }
    if perms.shared {
        flags |= mflags::MA_SHARED;
    }
    flags
}

fn mapped_size(process: &FixtureProcess) -> u64 {
    process.regions.iter().map(|r| r.size).fold(0, u64::saturating_add)
}

/// `/proc/<pid>/stat` line for `process`.
pub fn stat_line(process: &FixtureProcess, page_size: u64) -> String {
    let vsize = mapped_size(process);
    format!(
        "{pid} ({name}) S 1 {pid} {pid} 0 -1 4194304 120 0 0 0 7 3 0 0 20 0 1 0 8812 {vsize} {rss} 18446744073709551615\n",
        pid = process.pid,
        name = process.name,
        vsize = vsize.max(process.resident_pages.saturating_mul(page_size)),
        rss = process.resident_pages,
    )
}

/// `/proc/<pid>/maps` content for `process`.
pub fn maps_content(process: &FixtureProcess) -> String {
    let mut out = String::new();
    for (i, r) in process.regions.iter().enumerate() {
        out.push_str(&format!(
            "{:08x}-{:08x} {} 00000000 00:00 0",
            r.start,
            r.end(),
            perms_token(&r.perms)
        ));
        if i == 0 {
            out.push_str(&format!("          /usr/bin/{}", process.name));
        }
        out.push('\n');
    }
    out
}

/// Writes `processes` as a Linux-style text process table under `dir`.
///
/// Each process gets `<pid>/stat` and `<pid>/maps`. A regular `meminfo`
/// file is added so the table also holds a non-process entry.
pub fn write_text_table(dir: &Path, processes: &[FixtureProcess], page_size: u64) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create fixture dir {}", dir.display()))?;
    for p in processes {
        let pdir = dir.join(p.pid.to_string());
        fs::create_dir_all(&pdir)
            .with_context(|| format!("Failed to create {}", pdir.display()))?;
        fs::write(pdir.join("stat"), stat_line(p, page_size))?;
        fs::write(pdir.join("maps"), maps_content(p))?;
    }
    fs::write(dir.join("meminfo"), "MemTotal:       16318480 kB\n")?;
    debug!(
        "Wrote text process table with {} processes to {}",
        processes.len(),
        dir.display()
    );
    Ok(())
}

/// Writes `processes` as a Solaris-style binary process table under `dir`.
///
/// Each process gets `<pid>/psinfo` and `<pid>/map`. Resident size is stored
/// in kilobytes, so `page_size` should be a multiple of 1024.
pub fn write_binary_table(
    dir: &Path,
    processes: &[FixtureProcess],
    page_size: u64,
    uid: u32,
) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create fixture dir {}", dir.display()))?;
    for p in processes {
        let pdir = dir.join(p.pid.to_string());
        fs::create_dir_all(&pdir)
            .with_context(|| format!("Failed to create {}", pdir.display()))?;

        let info = PsInfo {
            pid: p.pid,
            ppid: 1,
            uid,
            size_kb: mapped_size(p) / 1024,
            rssize_kb: p.resident_pages.saturating_mul(page_size) / 1024,
            fname: p.name.clone(),
            psargs: format!("/usr/bin/{}", p.name),
        };
        fs::write(pdir.join("psinfo"), info.encode())?;

        let mut map = Vec::new();
        for r in &p.regions {
            let entry = PrMap {
                vaddr: r.start,
                size: r.size,
                mapname: "a.out".to_string(),
                offset: 0,
                mflags: perms_mflags(&r.perms),
                pagesize: page_size as i32,
                shmid: -1,
            };
            map.extend_from_slice(&entry.encode());
        }
        fs::write(pdir.join("map"), map)?;
    }
    debug!(
        "Wrote binary process table with {} processes to {}",
        processes.len(),
        dir.display()
    );
    Ok(())
}

/// Generator settings.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Processes carrying the target name.
    pub processes: usize,
    pub name: String,
    pub seed: Option<u64>,
    pub page_size: u64,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            processes: 8,
            name: "java".to_string(),
            seed: None,
            page_size: 4096,
        }
    }
}

/// Generates a table with `opts.processes` processes named `opts.name` plus
/// decoys whose names only resemble it.
pub fn generate(opts: &GeneratorOptions) -> Vec<FixtureProcess> {
    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let decoys = [
        format!("{}2", opts.name),
        opts.name.to_uppercase(),
        format!("{} ", opts.name),
        "bash".to_string(),
        "sshd".to_string(),
    ];

    let mut out = Vec::new();
    let mut pid = FIRST_PID;
    for _ in 0..opts.processes {
        out.push(random_process(&mut rng, pid, opts.name.clone(), opts.page_size));
        pid += 1;
    }
    for name in decoys.into_iter().filter(|d| *d != opts.name) {
        out.push(random_process(&mut rng, pid, name, opts.page_size));
        pid += 1;
    }
    out
}

fn random_process(rng: &mut impl Rng, pid: i32, name: String, page_size: u64) -> FixtureProcess {
    // 1 MiB - 512 MiB resident
    let resident_pages = rng.gen_range(256..131_072_u64) * 4096 / page_size;

    let mut process = FixtureProcess::new(pid, name, resident_pages);
    let mut addr = MAP_BASE;
    for _ in 0..rng.gen_range(3..24) {
        let (readable, writable, executable, shared) =
            REGION_KINDS[rng.gen_range(0..REGION_KINDS.len())];
        let size = rng.gen_range(1..2048_u64) * page_size;
        let mut region = FixtureRegion::new(addr, size, readable, writable, shared);
        region.perms.executable = executable;
        process.regions.push(region);
        // Leave a guard gap between mappings
        addr += size + page_size;
    }
    process
}

/// Totals per metric, keyed like the agent items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub vmrss: u64,
    pub allmap: u64,
    pub rwmap: u64,
    pub shmap: u64,
}

impl Totals {
    pub fn get(&self, metric: Metric) -> u64 {
        match metric {
            Metric::ResidentMemory => self.vmrss,
            Metric::AllMappings => self.allmap,
            Metric::ReadWriteMappings => self.rwmap,
            Metric::SharedMappings => self.shmap,
        }
    }

    fn set(&mut self, metric: Metric, value: u64) {
        match metric {
            Metric::ResidentMemory => self.vmrss = value,
            Metric::AllMappings => self.allmap = value,
            Metric::ReadWriteMappings => self.rwmap = value,
            Metric::SharedMappings => self.shmap = value,
        }
    }
}

/// Totals a fixture table must aggregate to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expected {
    pub version: String,
    pub generated_at: String,
    pub name: String,
    pub page_size: u64,
    pub processes: usize,
    pub totals: Totals,
}

impl Expected {
    /// Computes the totals of `name` over `processes`.
    pub fn compute(name: &str, processes: &[FixtureProcess], page_size: u64) -> Self {
        let matching: Vec<&FixtureProcess> =
            processes.iter().filter(|p| p.name == name).collect();

        let mut totals = Totals::default();
        for metric in Metric::ALL {
            let sum = matching
                .iter()
                .map(|p| p.metric_bytes(metric, page_size))
                .fold(0, u64::saturating_add);
            totals.set(metric, sum);
        }

        Self {
            version: FIXTURE_VERSION.to_string(),
            generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            name: name.to_string(),
            page_size,
            processes: matching.len(),
            totals,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write manifest {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::stat::parse_stat;
    use crate::process::{decode_flags, decode_token};
    use tempfile::tempdir;

    // -------------------------------------------------------------------------
    // Tests for perms_token / perms_mflags
    // -------------------------------------------------------------------------

    #[test]
    fn test_perms_encoders_match_decoders() {
        for (r, w, x, s) in REGION_KINDS {
            let mut region = FixtureRegion::new(0, 4096, r, w, s);
            region.perms.executable = x;
            let perms = region.perms;
            assert_eq!(decode_token(&perms_token(&perms)), Some(perms));
            assert_eq!(decode_flags(perms_mflags(&perms)), perms);
        }
    }

    // -------------------------------------------------------------------------
    // Tests for stat_line / maps_content
    // -------------------------------------------------------------------------

    #[test]
    fn test_stat_line_decodes() {
        let p = FixtureProcess::new(4242, "my proc", 25);
        let stat = parse_stat(&stat_line(&p, 4096)).unwrap();
        assert_eq!(stat.pid, 4242);
        assert_eq!(stat.comm, "my proc");
        assert_eq!(stat.rss_pages(), 25);
        assert_eq!(stat.fields_parsed, 24);
    }

    #[test]
    fn test_maps_content_format() {
        let p = FixtureProcess::new(1, "java", 1)
            .with_region(FixtureRegion::new(0x1000, 0x2000, true, true, false))
            .with_region(FixtureRegion::new(0x4000, 0x1000, true, false, true));
        let content = maps_content(&p);
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00001000-00003000 rw-p 00000000 00:00 0"));
        assert!(lines[0].ends_with("/usr/bin/java"));
        assert_eq!(lines[1], "00004000-00005000 r--s 00000000 00:00 0");
    }

    // -------------------------------------------------------------------------
    // Tests for generate / Expected
    // -------------------------------------------------------------------------

    #[test]
    fn test_generate_is_reproducible_with_seed() {
        let opts = GeneratorOptions {
            seed: Some(7),
            ..GeneratorOptions::default()
        };
        assert_eq!(generate(&opts), generate(&opts));
    }

    #[test]
    fn test_generate_adds_decoys() {
        let opts = GeneratorOptions {
            processes: 3,
            seed: Some(1),
            ..GeneratorOptions::default()
        };
        let procs = generate(&opts);
        assert_eq!(procs.iter().filter(|p| p.name == "java").count(), 3);
        assert!(procs.iter().any(|p| p.name == "java2"));
        assert!(procs.iter().any(|p| p.name == "JAVA"));
    }

    #[test]
    fn test_expected_compute() {
        let procs = vec![
            FixtureProcess::new(1, "java", 10)
                .with_region(FixtureRegion::new(0x1000, 4096, true, true, false))
                .with_region(FixtureRegion::new(0x3000, 8192, false, false, true))
                .with_region(FixtureRegion::new(0x6000, 100, true, false, false)),
            FixtureProcess::new(2, "java2", 99)
                .with_region(FixtureRegion::new(0x1000, 4096, true, true, false)),
        ];
        let expected = Expected::compute("java", &procs, 4096);
        assert_eq!(expected.processes, 1);
        assert_eq!(expected.totals.vmrss, 40960);
        assert_eq!(expected.totals.allmap, 12388);
        assert_eq!(expected.totals.rwmap, 4096);
        assert_eq!(expected.totals.shmap, 8192);
    }

    #[test]
    fn test_oversized_values_saturate() {
        let huge = FixtureRegion::new(u64::MAX - 0x1000, u64::MAX / 2 + 1, true, true, false);
        assert_eq!(huge.end(), u64::MAX);

        let procs = vec![
            FixtureProcess::new(1, "java", u64::MAX)
                .with_region(huge)
                .with_region(huge),
            FixtureProcess::new(2, "java", 1),
        ];
        assert_eq!(procs[0].metric_bytes(Metric::ResidentMemory, 4096), u64::MAX);
        assert_eq!(procs[0].metric_bytes(Metric::AllMappings, 4096), u64::MAX);

        let expected = Expected::compute("java", &procs, 4096);
        assert_eq!(expected.totals.vmrss, u64::MAX);
        assert_eq!(expected.totals.rwmap, u64::MAX);
        let line = stat_line(&procs[0], 4096);
        let vsize = line.split_whitespace().nth(22);
        assert_eq!(vsize, Some(u64::MAX.to_string().as_str()));
    }

    #[test]
    fn test_expected_save_and_load() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join(EXPECTED_FILE);
        let expected = Expected::compute("java", &[FixtureProcess::new(1, "java", 3)], 4096);
        expected.save(&path).unwrap();
        assert_eq!(Expected::load(&path).unwrap(), expected);
    }

    #[test]
    fn test_write_tables_layout() {
        let dir = tempdir().expect("Failed to create temp dir");
        let procs = vec![FixtureProcess::new(7, "java", 2)
            .with_region(FixtureRegion::new(0x1000, 4096, true, true, false))];

        write_text_table(&dir.path().join("text"), &procs, 4096).unwrap();
        assert!(dir.path().join("text/7/stat").is_file());
        assert!(dir.path().join("text/7/maps").is_file());
        assert!(dir.path().join("text/meminfo").is_file());

        write_binary_table(&dir.path().join("bin"), &procs, 4096, 0).unwrap();
        assert_eq!(
            fs::metadata(dir.path().join("bin/7/psinfo")).unwrap().len(),
            416
        );
        assert_eq!(fs::metadata(dir.path().join("bin/7/map")).unwrap().len(), 104);
    }
}
