//! Tool and pipeline configurations shared by the unit tests.

use anyhow::Result;

use config::{PipelineConfig, ToolConfig};
use workflow::{Library, SuperPipeline};

const ALIGN: &str = r#"{
    "id": "align", "executable": "aligner",
    "arguments": {
        "inputs": [
            {"long form argument": "--fastq", "short form argument": "-q", "data type": "string",
             "required": true, "extensions": ["fq", "fastq"], "description": "reads"},
            {"long form argument": "--reference", "short form argument": "-r", "data type": "string",
             "required": true, "extensions": ["fa"], "description": "reference genome"}
        ],
        "outputs": [
            {"long form argument": "--out", "short form argument": "-o", "data type": "string",
             "required": true, "extensions": ["bam"],
             "construct filename": {"method": "from tool argument", "use argument": "--fastq"}}
        ],
        "options": [
            {"long form argument": "--threads", "short form argument": "-t", "data type": "integer"}
        ]
    },
    "parameter sets": [
        {"id": "default", "data": [{"argument": "--threads", "values": [2]}]}
    ]
}"#;

const SORT: &str = r#"{
    "id": "sort", "executable": "sorter",
    "arguments": {
        "inputs": [{"long form argument": "--in", "data type": "string", "required": true, "extensions": ["bam"]}],
        "outputs": [
            {"long form argument": "--out", "data type": "string", "required": true, "extensions": ["bam"],
             "construct filename": {"method": "from tool argument", "use argument": "--in",
                                    "modify text": [{"add text": "_sorted"}]}}
        ]
    }
}"#;

const CALL: &str = r#"{
    "id": "call", "executable": "caller",
    "arguments": {
        "inputs": [
            {"long form argument": "--bam", "short form argument": "-b", "data type": "string",
             "required": true, "extensions": ["bam"]},
            {"long form argument": "--reference", "data type": "string", "required": true, "extensions": ["fa"]}
        ],
        "outputs": [
            {"long form argument": "--vcf", "data type": "string", "required": true, "extensions": ["vcf"],
             "construct filename": {"method": "from tool argument", "use argument": "--bam",
                                    "modify text": [{"add argument values": "--region"}]}}
        ],
        "options": [{"long form argument": "--region", "data type": "string"}]
    }
}"#;

const MERGE: &str = r#"{
    "id": "merge", "executable": "merger",
    "arguments": {
        "inputs": [
            {"long form argument": "--in", "data type": "string", "required": true,
             "extensions": ["vcf"], "allow multiple values": true}
        ],
        "outputs": [
            {"long form argument": "--out", "data type": "string", "required": true, "extensions": ["vcf"],
             "construct filename": {"method": "known filename", "filename": "merged.vcf",
                                    "directory argument": "--outdir"}}
        ],
        "options": [{"long form argument": "--outdir", "data type": "string"}]
    }
}"#;

const MARKDUP: &str = r#"{
    "id": "markdup", "executable": "markdup",
    "arguments": {
        "inputs": [{"long form argument": "--in", "data type": "string", "required": true, "extensions": ["bam"]}],
        "outputs": [
            {"long form argument": "--out", "data type": "string", "required": true,
             "is stub": true, "stub extensions": ["bam", "bam.bai"], "primary stub extension": "bam",
             "construct filename": {"method": "from tool argument", "use argument": "--in",
                                    "modify text": [{"add text": "_md"}]}}
        ]
    }
}"#;

const STATS: &str = r#"{
    "id": "stats", "executable": "stats",
    "arguments": {
        "inputs": [{"long form argument": "--in", "data type": "string", "required": true, "extensions": ["bam"]}],
        "outputs": [
            {"long form argument": "--report", "data type": "string", "required": true, "extensions": ["txt"],
             "construct filename": {"method": "from tool argument", "use argument": "--in"}}
        ]
    }
}"#;

/// Writes a report it has no recipe for.
const TALLY: &str = r#"{
    "id": "tally", "executable": "tally",
    "arguments": {
        "inputs": [{"long form argument": "--in", "data type": "string", "required": true, "extensions": ["bam"]}],
        "outputs": [{"long form argument": "--out", "data type": "string", "required": true, "extensions": ["txt"]}]
    }
}"#;

const BUNDLE: &str = r#"{
    "id": "bundle", "executable": "bundler",
    "arguments": {
        "inputs": [
            {"long form argument": "--in", "data type": "string", "required": true, "extensions": ["vcf"]},
            {"long form argument": "--idx", "data type": "string", "required": true, "extensions": ["tbi"]}
        ],
        "outputs": [
            {"long form argument": "--out", "data type": "string", "required": true, "extensions": ["vcf"],
             "construct filename": {"method": "known filename", "filename": "bundle.vcf"}}
        ]
    }
}"#;

/// align -> sort -> call, sharing the reference between align and call.
const VARIANTS: &str = r#"{
    "id": "variants",
    "pipeline tasks": [
        {"task": "align", "tool": "align"},
        {"task": "sort", "tool": "sort"},
        {"task": "call", "tool": "call"}
    ],
    "unique graph nodes": [
        {"id": "fq", "task": "align", "task argument": "--fastq"},
        {"id": "region", "task": "call", "task argument": "--region"},
        {"id": "vcf", "task": "call", "task argument": "--vcf"}
    ],
    "shared graph nodes": [
        {"id": "ref", "arguments sharing node": [
            {"task": "align", "task argument": "--reference"},
            {"task": "call", "task argument": "--reference"}]},
        {"id": "aligned", "delete files": true, "arguments sharing node": [
            {"task": "align", "task argument": "--out"},
            {"task": "sort", "task argument": "--in"}]},
        {"id": "sorted", "arguments sharing node": [
            {"task": "sort", "task argument": "--out"},
            {"task": "call", "task argument": "--bam"}]}
    ],
    "arguments": {
        "inputs": [
            {"long form argument": "--fastq", "short form argument": "-q", "node id": "fq"},
            {"long form argument": "--reference", "short form argument": "-r", "node id": "ref"}
        ],
        "options": [{"long form argument": "--region", "node id": "region"}]
    },
    "parameter sets": [
        {"id": "default", "data": [{"node": "region", "values": ["chr1"]}]},
        {"id": "hg38", "data": [{"argument": "--reference", "values": ["hg38.fa"]}]}
    ]
}"#;

/// variants nested once, with its calls merged at the root.
const COHORT: &str = r#"{
    "id": "cohort",
    "pipeline tasks": [
        {"task": "sample", "pipeline": "variants"},
        {"task": "merge", "tool": "merge", "greedy argument": "--in"}
    ],
    "shared graph nodes": [
        {"id": "calls", "arguments sharing node": [
            {"task": "sample", "node id": "vcf"},
            {"task": "merge", "task argument": "--in"}]}
    ],
    "import arguments": "sample"
}"#;

/// A stub output consumed whole by one task and by primary file by another.
const DEDUP: &str = r#"{
    "id": "dedup",
    "pipeline tasks": [
        {"task": "markdup", "tool": "markdup"},
        {"task": "stats", "tool": "stats"}
    ],
    "unique graph nodes": [
        {"id": "bam", "task": "markdup", "task argument": "--in"}
    ],
    "shared graph nodes": [
        {"id": "marked", "arguments sharing node": [
            {"task": "markdup", "task argument": "--out"},
            {"task": "stats", "task argument": "--in"}]}
    ],
    "arguments": {
        "inputs": [{"long form argument": "--bam", "node id": "bam"}]
    }
}"#;

/// One greedy task with two inputs that each get several values.
const BUNDLED: &str = r#"{
    "id": "bundled",
    "pipeline tasks": [{"task": "bundle", "tool": "bundle", "greedy argument": "--in"}],
    "unique graph nodes": [
        {"id": "vcfs", "task": "bundle", "task argument": "--in"},
        {"id": "indexes", "task": "bundle", "task argument": "--idx"}
    ],
    "arguments": {
        "inputs": [
            {"long form argument": "--in", "node id": "vcfs"},
            {"long form argument": "--idx", "node id": "indexes"}
        ]
    }
}"#;

pub fn library() -> Result<Library> {
    let mut lib = Library::default();
    for (text, file) in [
        (ALIGN, "align.json"),
        (SORT, "sort.json"),
        (CALL, "call.json"),
        (MERGE, "merge.json"),
        (MARKDUP, "markdup.json"),
        (STATS, "stats.json"),
        (TALLY, "tally.json"),
        (BUNDLE, "bundle.json"),
    ] {
        lib.add_tool(ToolConfig::from_json_str(text, file)?);
    }
    for (text, file) in [
        (VARIANTS, "variants.json"),
        (COHORT, "cohort.json"),
        (DEDUP, "dedup.json"),
        (BUNDLED, "bundled.json"),
    ] {
        lib.add_pipeline(PipelineConfig::from_json_str(text, file)?);
    }
    Ok(lib)
}

pub fn assemble(root: &str) -> Result<SuperPipeline> {
    let mut lib = library()?;
    SuperPipeline::assemble(&mut lib, root)
}
