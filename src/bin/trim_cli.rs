#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("trim_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::fmt::Write as _;
    use std::fs::{self, File};
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};

    use trim_engine::geom::{
        NurbsSurface, Point3, PolygonizeOptions, SplitDirection, TrimContext, TrimDiagnostics,
        TrimMesh, TrimmedSurface, UvCurve, UvPoint, polygonize,
    };

    const SNAPSHOT_QUANTIZE: f64 = 1e-6;
    const SNAPSHOT_DECIMALS: usize = 6;
    const FLATNESS: f64 = 1e-2;

    const USAGE: &str = r"trim_cli (trim-engine)

USAGE:
  trim_cli list
  trim_cli run <scenario|all> [options]

SCENARIOS:
  square_untrimmed
  disk
  donut
  bump_donut
  split_disk

OPTIONS (run):
  --out-dir <dir>    Write <scenario>.obj and <scenario>.snap to this dir (required for `all`)
  --obj <path>       Write OBJ (single scenario only)
  --snap <path>      Write snapshot text (single scenario only)
  --flatness <f>     Polygonization flatness (default 0.01)
  --overwrite        Overwrite existing output files
  -h, --help         Show this help
";

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                for scenario in Scenario::ALL {
                    println!("{}", scenario.name());
                }
                Ok(())
            }
            "run" => cmd_run(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    struct RunOptions {
        flatness: f64,
        overwrite: bool,
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let scenario_name = args.next().ok_or("missing scenario name")?;

        let mut out_dir: Option<PathBuf> = None;
        let mut obj_path: Option<PathBuf> = None;
        let mut snap_path: Option<PathBuf> = None;
        let mut opts = RunOptions {
            flatness: FLATNESS,
            overwrite: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--out-dir" => out_dir = Some(PathBuf::from(args.value("--out-dir")?)),
                "--obj" => obj_path = Some(PathBuf::from(args.value("--obj")?)),
                "--snap" => snap_path = Some(PathBuf::from(args.value("--snap")?)),
                "--flatness" => {
                    let raw = args.value("--flatness")?;
                    opts.flatness = raw
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && *f > 0.0)
                        .ok_or_else(|| format!("invalid --flatness `{raw}`"))?;
                }
                "--overwrite" => opts.overwrite = true,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        if let Some(dir) = out_dir.as_ref() {
            if obj_path.is_some() || snap_path.is_some() {
                return Err("use either --out-dir or --obj/--snap (not both)".to_string());
            }
            fs::create_dir_all(dir).map_err(|e| format!("create out dir: {e}"))?;

            if scenario_name == "all" {
                for scenario in Scenario::ALL {
                    run_to_dir(*scenario, dir, &opts)?;
                }
                return Ok(());
            }
            let scenario = Scenario::from_name(&scenario_name).ok_or_else(|| unknown_scenario(&scenario_name))?;
            return run_to_dir(scenario, dir, &opts);
        }

        if scenario_name == "all" {
            return Err("`run all` requires --out-dir".to_string());
        }

        let scenario = Scenario::from_name(&scenario_name).ok_or_else(|| unknown_scenario(&scenario_name))?;
        let output = run_scenario(scenario, opts.flatness)?;

        if let Some(path) = snap_path.as_deref() {
            write_text_file(path, &output.snapshot, opts.overwrite)?;
            eprintln!("wrote {}", path.display());
        } else {
            print!("{}", output.snapshot);
        }
        if let Some(path) = obj_path.as_deref() {
            write_obj_file(path, &output.mesh, output.name, opts.overwrite)?;
            eprintln!("wrote {}", path.display());
        }
        print_summary(&output);
        Ok(())
    }

    fn run_to_dir(scenario: Scenario, dir: &Path, opts: &RunOptions) -> Result<(), String> {
        let output = run_scenario(scenario, opts.flatness)?;

        let path = dir.join(format!("{}.snap", output.name));
        write_text_file(&path, &output.snapshot, opts.overwrite)?;
        eprintln!("wrote {}", path.display());

        let path = dir.join(format!("{}.obj", output.name));
        write_obj_file(&path, &output.mesh, output.name, opts.overwrite)?;
        eprintln!("wrote {}", path.display());

        print_summary(&output);
        Ok(())
    }

    fn print_summary(output: &ScenarioOutput) {
        eprintln!(
            "{}: vertices={} triangles={} loops={} chain_tolerance={:e}",
            output.name,
            output.mesh.vertex_count(),
            output.mesh.triangle_count(),
            output.diagnostics.loop_count,
            output.diagnostics.chain_tolerance
        );
    }

    fn unknown_scenario(name: &str) -> String {
        let mut msg = format!("unknown scenario `{name}`\n\navailable scenarios:\n");
        for scenario in Scenario::ALL {
            let _ = writeln!(msg, "  {}", scenario.name());
        }
        msg
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scenario {
        SquareUntrimmed,
        Disk,
        Donut,
        BumpDonut,
        SplitDisk,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[
            Scenario::SquareUntrimmed,
            Scenario::Disk,
            Scenario::Donut,
            Scenario::BumpDonut,
            Scenario::SplitDisk,
        ];

        fn name(self) -> &'static str {
            match self {
                Scenario::SquareUntrimmed => "square_untrimmed",
                Scenario::Disk => "disk",
                Scenario::Donut => "donut",
                Scenario::BumpDonut => "bump_donut",
                Scenario::SplitDisk => "split_disk",
            }
        }

        fn from_name(name: &str) -> Option<Self> {
            Self::ALL.iter().copied().find(|s| s.name() == name)
        }
    }

    struct ScenarioOutput {
        name: &'static str,
        mesh: TrimMesh,
        diagnostics: TrimDiagnostics,
        snapshot: String,
    }

    fn unit_square() -> NurbsSurface {
        NurbsSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        )
    }

    /// Biquadratic patch whose middle control point is raised.
    fn bump() -> Result<NurbsSurface, String> {
        let mut points = Vec::with_capacity(9);
        for v in 0..3 {
            for u in 0..3 {
                let z = if u == 1 && v == 1 { 0.5 } else { 0.0 };
                points.push(Point3::new(f64::from(u) * 0.5, f64::from(v) * 0.5, z));
            }
        }
        NurbsSurface::from_grid(2, 2, 3, 3, points)
    }

    fn circle(radius: f64) -> Result<UvCurve, String> {
        UvCurve::circle(UvPoint::new(0.5, 0.5), radius)
    }

    fn build(scenario: Scenario, ctx: &TrimContext) -> Result<(TrimmedSurface, TrimDiagnostics), String> {
        let (surface, curves) = match scenario {
            Scenario::SquareUntrimmed => (unit_square(), Vec::new()),
            Scenario::Disk | Scenario::SplitDisk => (unit_square(), vec![circle(0.3)?]),
            Scenario::Donut => (unit_square(), vec![circle(0.4)?, circle(0.2)?]),
            Scenario::BumpDonut => (bump()?, vec![circle(0.4)?, circle(0.2)?]),
        };
        TrimmedSurface::new(surface, curves, ctx).map_err(|e| e.to_string())
    }

    fn run_scenario(scenario: Scenario, flatness: f64) -> Result<ScenarioOutput, String> {
        let ctx = TrimContext::new();
        let options = PolygonizeOptions::with_flatness(flatness);
        let (trimmed, mut diagnostics) = build(scenario, &ctx)?;

        let parts = if scenario == Scenario::SplitDisk {
            let split = trimmed
                .subdivide(0.5, SplitDirection::U, &ctx)
                .map_err(|e| e.to_string())?;
            diagnostics.merge(&split.diagnostics);
            split.low.into_iter().chain(split.high).collect()
        } else {
            vec![trimmed]
        };

        let mut mesh = TrimMesh::default();
        for part in &parts {
            let result = polygonize(part, &options, &ctx).map_err(|e| e.to_string())?;
            diagnostics.merge(&result.diagnostics);
            append_mesh(&mut mesh, result.mesh);
        }
        mesh.validate().map_err(|e| format!("{}: {e}", scenario.name()))?;

        let snapshot = render_snapshot(scenario.name(), &mesh, &diagnostics);
        Ok(ScenarioOutput {
            name: scenario.name(),
            mesh,
            diagnostics,
            snapshot,
        })
    }

    fn append_mesh(into: &mut TrimMesh, part: TrimMesh) {
        let offset = u32::try_from(into.positions.len()).unwrap_or(u32::MAX);
        let first = into.positions.is_empty();
        into.indices.extend(part.indices.iter().map(|i| i + offset));
        into.positions.extend(part.positions);
        if first {
            into.uvs = part.uvs;
            into.normals = part.normals;
            return;
        }
        match (into.uvs.as_mut(), part.uvs) {
            (Some(uvs), Some(more)) => uvs.extend(more),
            _ => into.uvs = None,
        }
        match (into.normals.as_mut(), part.normals) {
            (Some(normals), Some(more)) => normals.extend(more),
            _ => into.normals = None,
        }
    }

    fn quantize_f64(value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let q = (value / SNAPSHOT_QUANTIZE).round() * SNAPSHOT_QUANTIZE;
        if q == 0.0 { 0.0 } else { q }
    }

    fn write_f64(out: &mut String, value: f64) {
        let _ = write!(out, "{:.SNAPSHOT_DECIMALS$}", quantize_f64(value));
    }

    fn render_snapshot(name: &str, mesh: &TrimMesh, diag: &TrimDiagnostics) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "scenario {name}");
        let _ = writeln!(out, "vertex_count {}", mesh.vertex_count());
        let _ = writeln!(out, "triangle_count {}", mesh.triangle_count());
        let _ = writeln!(out, "diag.loop_count {}", diag.loop_count);
        let _ = write!(out, "diag.chain_tolerance ");
        write_f64(&mut out, diag.chain_tolerance);
        out.push('\n');
        let _ = writeln!(out, "diag.snapped_junctions {}", diag.snapped_junctions);
        let _ = writeln!(out, "diag.seam_edges {}", diag.seam_edges);
        let _ = writeln!(out, "diag.degenerate_segments {}", diag.degenerate_segments);
        let _ = writeln!(out, "diag.sliver_sides {}", diag.sliver_sides);
        for (idx, warning) in diag.warnings.iter().enumerate() {
            let _ = writeln!(out, "diag.warning.{idx} {warning}");
        }
        for p in &mesh.positions {
            out.push('v');
            for c in p {
                out.push(' ');
                write_f64(&mut out, *c);
            }
            out.push('\n');
        }
        for tri in mesh.indices.chunks_exact(3) {
            let _ = writeln!(out, "f {} {} {}", tri[0], tri[1], tri[2]);
        }
        out
    }

    fn check_writable(path: &Path, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        Ok(())
    }

    fn write_text_file(path: &Path, text: &str, overwrite: bool) -> Result<(), String> {
        check_writable(path, overwrite)?;
        fs::write(path, text).map_err(|e| format!("write {}: {e}", path.display()))
    }

    fn write_obj_file(path: &Path, mesh: &TrimMesh, name: &str, overwrite: bool) -> Result<(), String> {
        mesh.validate().map_err(|e| format!("mesh validation failed: {e}"))?;
        check_writable(path, overwrite)?;

        let file = File::create(path).map_err(|e| format!("create {}: {e}", path.display()))?;
        let mut w = BufWriter::new(file);
        let err = |e: std::io::Error| format!("write obj: {e}");

        writeln!(w, "# trim-engine trim_cli").map_err(err)?;
        writeln!(w, "o {name}").map_err(err)?;
        for p in &mesh.positions {
            writeln!(w, "v {} {} {}", p[0], p[1], p[2]).map_err(err)?;
        }
        for uv in mesh.uvs.iter().flatten() {
            writeln!(w, "vt {} {}", uv[0], uv[1]).map_err(err)?;
        }
        for n in mesh.normals.iter().flatten() {
            writeln!(w, "vn {} {} {}", n[0], n[1], n[2]).map_err(err)?;
        }

        let has_uvs = mesh.uvs.is_some();
        let has_normals = mesh.normals.is_some();
        for tri in mesh.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] + 1, tri[1] + 1, tri[2] + 1);
            match (has_uvs, has_normals) {
                (true, true) => writeln!(w, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}"),
                (true, false) => writeln!(w, "f {a}/{a} {b}/{b} {c}/{c}"),
                (false, true) => writeln!(w, "f {a}//{a} {b}//{b} {c}//{c}"),
                (false, false) => writeln!(w, "f {a} {b} {c}"),
            }
            .map_err(err)?;
        }

        w.flush().map_err(|e| format!("flush {}: {e}", path.display()))
    }

    struct Args {
        inner: std::vec::IntoIter<String>,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self {
                inner: args.into_iter(),
            }
        }

        fn next(&mut self) -> Option<String> {
            self.inner.next()
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next().ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
