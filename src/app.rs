use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use rand::{rngs::StdRng, SeedableRng};

use graph::{
    check_consistency, check_required, check_values, construct_filenames, external_inputs,
    workflow_order, ExecutionPlan, GraphBuilder, Interface, PipelineGraph, Resolver,
};
use workflow::{Library, PipelineId, SuperPipeline};

use crate::emit::Makefile;
use crate::exec::run_make;
use crate::export;
use crate::fs::Fs;
use crate::settings::Settings;
use crate::ui::Ui;

const PARAMETER_SET_EXT: &str = "json";

/// What a run produced, for callers that want to look at it.
#[derive(Debug)]
pub struct Outcome {
    pub makefile: PathBuf,
    /// Files the pipeline reads but doesn't make.
    pub inputs: Vec<String>,
    pub num_tasks: usize,
    pub num_phases: usize,
}

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// Filesystem interface
    fs: Fs,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings) -> Self {
        let fs = Fs::new(Path::new("."));
        let ui = Ui::new(&settings);
        Self { settings, fs, ui }
    }

    /// Plan the pipeline, write its Makefile, and run it if asked to.
    pub fn run(mut self) -> Result<Outcome> {
        let sp = self.assemble()?;
        let root = Interface::for_pipeline(&sp, PipelineId::from(0))?;
        let mut graph = self.build_graph(&sp)?;

        self.ui.verbose_progress("Checking arguments");
        check_required(&graph, &sp, &root)?;
        self.ui.done();

        let order = workflow_order(&graph, &sp)?;
        self.construct(&sp, &mut graph, &order)?;
        check_values(&graph)?;
        check_consistency(&graph)?;

        self.ui.verbose_progress("Planning execution");
        let plan = ExecutionPlan::create(&graph, &sp, &order)?;
        self.ui.done();

        self.export(&graph, &root)?;

        let inputs = external_inputs(&graph);
        if self.settings.input_check {
            self.fs
                .check_inputs_exist(&inputs)
                .context("while checking the pipeline's input files")?;
        } else {
            self.ui
                .warn(&format!("not checking that {} input files exist", inputs.len()));
        }

        self.fs
            .ensure_output_dir_exists(&self.settings.output_path, self.ui.verbose)?;
        let text = Makefile::new(&sp, &graph, &plan, self.settings.resources.as_deref())
            .render()
            .context("while writing the Makefile")?;
        self.fs.write_file(&self.settings.makefile, &text)?;
        self.ui.wrote("Makefile", &self.settings.makefile);

        if self.settings.execute {
            eprintln!("\n{}.\n", "Starting pipeline execution".magenta());
            run_make(&self.settings.makefile, self.settings.jobs, self.ui.verbose)?;
            eprintln!("\n{}.", "Pipeline complete".green());
        }

        Ok(Outcome {
            makefile: self.settings.makefile.clone(),
            inputs,
            num_tasks: order.len(),
            num_phases: plan.phases().len(),
        })
    }

    fn assemble(&mut self) -> Result<SuperPipeline> {
        self.ui
            .verbose_progress_debug("Reading configuration from", &self.settings.config_dir);
        self.ui.start_timer();
        let mut library = Library::open(&self.settings.config_dir).with_context(|| {
            format!("while indexing config directory {:?}", self.settings.config_dir)
        })?;
        let sp = SuperPipeline::assemble(&mut library, &self.settings.pipeline)
            .with_context(|| format!("while loading pipeline \"{}\"", self.settings.pipeline))?;
        self.ui.done();
        self.ui.print_elapsed("Loading configuration")?;

        self.ui.verbose_msg(&format!(
            "Assembled pipeline with {} tasks in {} tiers.",
            sp.num_tasks(),
            sp.num_tiers()
        ));
        Ok(sp)
    }

    fn build_graph(&mut self, sp: &SuperPipeline) -> Result<PipelineGraph> {
        self.ui.verbose_progress("Building graph");
        self.ui.start_timer();
        let mut graph = GraphBuilder::new(sp).build()?;
        Resolver::new(sp, &mut graph).resolve(&self.settings.request)?;
        self.ui.done();
        self.ui.print_elapsed("Building graph")?;
        log::debug!("graph has {} nodes", graph.num_nodes());
        Ok(graph)
    }

    fn construct(
        &mut self,
        sp: &SuperPipeline,
        graph: &mut PipelineGraph,
        order: &[workflow::TaskId],
    ) -> Result<()> {
        self.ui.verbose_progress("Constructing filenames");
        let mut rng = match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        construct_filenames(graph, sp, order, &self.settings.output_path, &mut rng)?;
        self.ui.done();
        Ok(())
    }

    fn export(&self, graph: &PipelineGraph, root: &Interface) -> Result<()> {
        if let Some(name) = &self.settings.export_parameter_set {
            let set = export::parameter_set(graph, root, name);
            let mut path = PathBuf::from(&self.settings.output_path);
            path.push(format!("{name}.{PARAMETER_SET_EXT}"));
            let text = serde_json::to_string_pretty(&set)?;
            self.fs.write_file(&path, &text)?;
            self.ui.wrote("parameter set", &path);
        }
        if let Some(path) = &self.settings.dot {
            let text = export::dot(graph, self.settings.dot_reduced)?;
            self.fs.write_file(path, &text)?;
            self.ui.wrote("graph", path);
        }
        Ok(())
    }
}
