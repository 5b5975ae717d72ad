use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, trace};

use crate::{
    atoms::{Atom, AtomStore},
    compute::ThermoState,
    config::{CreateConfig, RunConfig, SimConfig},
    domain::Domain,
    integrators::{Integrator, Verlet},
    lattice::{Cubic, Lattice},
    neighbor::{Bins, NeighborBuilder, NeighborList},
    output::{Operation, Value},
    parallel::{CommPartition, Communicator},
    plugin::{Control, EndOfStepContext, ForceContext, Hooks, Plugin, SetupContext, StepContext},
    region::{Rect, Region},
    registry::StyleRegistry,
    styles::Thermo,
    utils::KeyedVec,
    Error,
};

type PluginVec = KeyedVec<String, Box<dyn Plugin>>;

/// Point in the step pipeline, reported at trace level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    InitialIntegrate,
    PostIntegrate,
    PreExchange,
    Migrate,
    Sort,
    ExchangeGhosts,
    RebuildNeighbors,
    ForwardComm,
    PreForce,
    ForceCompute,
    ReverseComm,
    PostForce,
    FinalIntegrate,
    EndOfStep,
}

/// Indices into the plugin list, per hook, in insertion order
#[derive(Debug, Default)]
struct HookLists {
    pre_exchange: Vec<usize>,
    post_integrate: Vec<usize>,
    compute_force: Vec<usize>,
    modify_force: Vec<usize>,
    end_of_step: Vec<usize>,
}
impl HookLists {
    fn new(plugins: &PluginVec) -> Self {
        let mut lists = Self::default();
        for (idx, plugin) in plugins.values().iter().enumerate() {
            let hooks = plugin.hooks();
            for (hook, list) in [
                (Hooks::PRE_EXCHANGE, &mut lists.pre_exchange),
                (Hooks::POST_INTEGRATE, &mut lists.post_integrate),
                (Hooks::COMPUTE_FORCE, &mut lists.compute_force),
                (Hooks::MODIFY_FORCE, &mut lists.modify_force),
                (Hooks::END_OF_STEP, &mut lists.end_of_step),
            ] {
                if hooks.contains(hook) {
                    list.push(idx);
                }
            }
        }
        lists
    }
}

/// Outcome of [`Simulation::run`] on this rank
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: usize,
    /// A plugin requested the stop before the requested step count
    pub stopped_early: bool,
    pub neighbor_builds: usize,
    /// Atoms this rank handed to other ranks
    pub atoms_sent: usize,
}

/// One rank's share of the simulation. Every rank builds its own copy with
/// the same configuration and plugins; collectives keep them in lock step.
pub struct Simulation<'c> {
    comm: &'c mut Communicator,
    domain: Domain,
    atoms: AtomStore,
    partition: CommPartition,
    neighbor: NeighborBuilder,
    neighbor_list: NeighborList,
    integrator: Box<dyn Integrator>,
    plugins: PluginVec,
    hooks: HookLists,
    pool: ThreadPool,
    timestep: f64,
    run_config: RunConfig,
    step: usize,
    is_setup: bool,
    potential_energy: f64,
    atoms_sent: usize,
}

impl<'c> Simulation<'c> {
    /// Create an empty simulation with no atoms and no plugins
    pub fn new(comm: &'c mut Communicator, domain: Domain, config: &SimConfig) -> Result<Self, Error> {
        config.validate()?;
        let mut atoms = AtomStore::new(config.num_types);
        if let Some(masses) = &config.masses {
            for (t, &m) in masses.iter().enumerate() {
                atoms.set_mass(t + 1, m)?;
            }
        }
        let partition = CommPartition::new(comm, &domain, &config.comm)?;
        let neighbor = NeighborBuilder::new(config.neighbor.clone())?;
        let rank = comm.rank();
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.comm.threads_per_rank)
            .thread_name(move |i| format!("rank{}-worker{}", rank, i))
            .build()?;
        debug!(
            dims = ?partition.grid().dims(),
            lo = ?partition.subdomain().lo(),
            hi = ?partition.subdomain().hi(),
            "Sub-domain assigned"
        );
        Ok(Self {
            comm,
            domain,
            atoms,
            partition,
            neighbor_list: NeighborList::empty(config.neighbor.policy, 0.0),
            neighbor,
            integrator: Box::new(Verlet),
            plugins: KeyedVec::new(),
            hooks: HookLists::default(),
            pool,
            timestep: config.timestep,
            run_config: config.run.clone(),
            step: 0,
            is_setup: false,
            potential_energy: 0.0,
            atoms_sent: 0,
        })
    }

    /// Build the box, atoms, velocities and plugins described by `config`
    pub fn from_config(
        comm: &'c mut Communicator,
        config: &SimConfig,
        registry: &StyleRegistry,
    ) -> Result<Self, Error> {
        let domain = config.domain.build()?;
        let mut sim = Self::new(comm, domain, config)?;
        for create in &config.create {
            match create {
                CreateConfig::Random {
                    count,
                    atom_type,
                    seed,
                } => sim.add_random_atoms(*count, *atom_type, *seed)?,
                CreateConfig::Lattice { spacing, atom_type } => {
                    sim.create_lattice(&Cubic::new(*spacing)?, *atom_type)?
                }
            };
        }
        if let Some(velocity) = &config.velocity {
            sim.set_temperature(velocity.temperature, velocity.seed)?;
        }
        for style in &config.styles {
            let plugin = registry.build(style, config.num_types)?;
            sim.add_plugin(plugin)?;
        }
        let has_thermo = config.styles.iter().any(|s| s.style == Thermo::STYLE);
        if config.run.thermo_every > 0 && !has_thermo {
            let thermo = Thermo::new(
                Thermo::STYLE,
                config.run.thermo_every,
                Thermo::DEFAULT_COLUMNS.to_vec(),
            )?;
            sim.add_plugin(Box::new(thermo))?;
        }
        Ok(sim)
    }

    // Getters
    pub fn comm(&mut self) -> &mut Communicator {
        &mut *self.comm
    }
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }
    pub fn domain(&self) -> &Domain {
        &self.domain
    }
    pub fn atoms(&self) -> &AtomStore {
        &self.atoms
    }
    /// Changing ownership-relevant state here requires a new setup
    pub fn atoms_mut(&mut self) -> &mut AtomStore {
        self.is_setup = false;
        &mut self.atoms
    }
    pub fn partition(&self) -> &CommPartition {
        &self.partition
    }
    pub fn neighbor(&self) -> &NeighborBuilder {
        &self.neighbor
    }
    pub fn neighbor_list(&self) -> &NeighborList {
        &self.neighbor_list
    }
    pub fn timestep(&self) -> f64 {
        self.timestep
    }
    /// Number of completed steps
    pub fn current_step(&self) -> usize {
        self.step
    }
    /// This rank's share of the potential energy at the current step
    pub fn potential_energy(&self) -> f64 {
        self.potential_energy
    }
    pub fn plugin_ids(&self) -> &[String] {
        self.plugins.keys()
    }
    pub fn plugin<T: Plugin>(&self, id: &str) -> Option<&T> {
        self.plugins
            .get(&id.to_string())
            .and_then(|p| p.as_any().downcast_ref())
    }
    pub fn plugin_mut<T: Plugin>(&mut self, id: &str) -> Option<&mut T> {
        self.plugins
            .get_mut(&id.to_string())
            .and_then(|p| p.as_any_mut().downcast_mut())
    }

    // Setters
    pub fn set_timestep(&mut self, timestep: f64) -> Result<(), Error> {
        if !(timestep > 0.0 && timestep.is_finite()) {
            return Err(Error::config(format!(
                "Timestep should be positive, found {}",
                timestep
            )));
        }
        self.timestep = timestep;
        Ok(())
    }
    pub fn set_integrator(&mut self, integrator: Box<dyn Integrator>) {
        self.integrator = integrator;
    }

    // Plugins

    /// Add a plugin. Every rank must add the same plugins in the same order.
    pub fn add_plugin(&mut self, plugin: Box<dyn Plugin>) -> Result<(), Error> {
        let id = plugin.id().to_string();
        let style = plugin.style().to_string();
        if self.plugins.add(id.clone(), plugin).is_none() {
            return Err(Error::config(format!("Duplicate plugin id '{}'", id)));
        }
        debug!(%id, %style, "Plugin added");
        self.hooks = HookLists::new(&self.plugins);
        self.is_setup = false;
        Ok(())
    }
    /// Remove a plugin after running its teardown
    pub fn remove_plugin(&mut self, id: &str) -> Result<Box<dyn Plugin>, Error> {
        let mut plugin = self
            .plugins
            .remove(&id.to_string())
            .ok_or_else(|| Error::config(format!("No plugin with id '{}'", id)))?;
        plugin.teardown(&mut self.atoms);
        self.hooks = HookLists::new(&self.plugins);
        self.is_setup = false;
        debug!(id, "Plugin removed");
        Ok(plugin)
    }

    // Atom creation

    /// Add atoms from a list shared by every rank; each rank keeps the ones
    /// inside its sub-domain. Returns how many this rank kept.
    pub fn create_atoms(&mut self, atoms: Vec<Atom>) -> Result<usize, Error> {
        let mut tags: Vec<u64> = atoms.iter().map(|a| a.tag).collect();
        tags.sort_unstable();
        if let Some(w) = tags.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::DuplicateTag(w[0]));
        }
        let clash = tags
            .iter()
            .copied()
            .find(|&t| self.atoms.tag_to_local(t).is_some_and(|i| i < self.atoms.nlocal()));
        if self.comm.any(clash.is_some())? {
            // Tags are shifted by one so that a rank without a clash contributes nothing
            let shifted = clash.map_or(0, |t| t as usize + 1);
            let tag = self.comm.all_reduce_usize(shifted, Operation::Max)? - 1;
            return Err(Error::DuplicateTag(tag as u64));
        }

        let total = atoms.len();
        let mut kept = 0;
        for mut atom in atoms {
            let remap = self.domain.remap(&atom.position, &atom.image);
            if remap.lost {
                return Err(Error::LostAtom {
                    tag: atom.tag,
                    position: atom.position,
                    reason: "created outside the box".to_string(),
                });
            }
            atom.position = remap.position;
            atom.image = remap.image;
            if self.partition.subdomain().owns(&self.domain, &atom.position) {
                self.atoms.insert(atom)?;
                kept += 1;
            }
        }
        let found = self.comm.all_reduce_usize(kept, Operation::Sum)?;
        if found != total {
            return Err(Error::LostAtoms {
                expected: total,
                found,
            });
        }
        self.partition.reset_atom_count();
        self.is_setup = false;
        debug!(kept, total, "Atoms created");
        Ok(kept)
    }

    /// Smallest tag not used on any rank
    fn next_tag(&mut self) -> Result<u64, Error> {
        let max = self.atoms.max_tag().unwrap_or(0) as usize;
        Ok(self.comm.all_reduce_usize(max, Operation::Max)? as u64 + 1)
    }

    /// Add `n` atoms uniformly distributed over the whole box. The result
    /// does not depend on the number of ranks.
    pub fn add_random_atoms(&mut self, n: usize, atom_type: usize, seed: u64) -> Result<usize, Error> {
        let first = self.next_tag()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let atoms = (0..n)
            .map(|k| {
                let lamda: [f64; 3] = [rng.gen(), rng.gen(), rng.gen()];
                Atom::new(first + k as u64, atom_type, self.domain.cartesian_from_lamda(&lamda))
            })
            .collect();
        self.create_atoms(atoms)
    }

    /// Add `n` atoms uniformly distributed over `region`
    pub fn add_random_atoms_in<R: Region>(
        &mut self,
        region: &R,
        n: usize,
        atom_type: usize,
        seed: u64,
    ) -> Result<usize, Error> {
        let first = self.next_tag()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let atoms = (0..n)
            .map(|k| Atom::new(first + k as u64, atom_type, region.random_coord(&mut rng)))
            .collect();
        self.create_atoms(atoms)
    }

    /// Fill the box with lattice points
    pub fn create_lattice<L: Lattice>(&mut self, lattice: &L, atom_type: usize) -> Result<usize, Error> {
        let first = self.next_tag()?;
        let rect = Rect::from_corners(self.domain.lo(), self.domain.hi());
        let atoms = lattice
            .coords_within_region(&rect, &self.domain.lo())
            .into_iter()
            .filter(|x| self.domain.contains(x))
            .enumerate()
            .map(|(k, x)| Atom::new(first + k as u64, atom_type, x))
            .collect();
        self.create_atoms(atoms)
    }

    /// Draw Gaussian velocities for temperature `temperature`, remove the
    /// center-of-mass motion and rescale to the exact temperature. Each
    /// atom's draw depends only on its tag and `seed`.
    pub fn set_temperature(&mut self, temperature: f64, seed: u64) -> Result<(), Error> {
        let normal = Normal::new(0.0, 1.0).map_err(|e| Error::config(e.to_string()))?;
        let nlocal = self.atoms.nlocal();
        let mut momentum = [0.0; 3];
        let mut mass = 0.0;
        for i in 0..nlocal {
            let tag = self.atoms.tags()[i];
            let m = self.atoms.mass(i);
            let mut rng = StdRng::seed_from_u64(seed ^ tag.wrapping_mul(0x9E37_79B9_7F4A_7C15));
            let sd = (temperature / m).sqrt();
            let v = [
                sd * normal.sample(&mut rng),
                sd * normal.sample(&mut rng),
                sd * normal.sample(&mut rng),
            ];
            self.atoms.velocities_mut()[i] = v;
            for d in 0..3 {
                momentum[d] += m * v[d];
            }
            mass += m;
        }

        let totals = self.comm.all_reduce_values(
            vec![
                Value::Float(momentum[0]),
                Value::Float(momentum[1]),
                Value::Float(momentum[2]),
                Value::Float(mass),
            ],
            &[Operation::Sum; 4],
        )?;
        let total_mass = totals[3].as_f64();
        if total_mass > 0.0 {
            let vcm = [
                totals[0].as_f64() / total_mass,
                totals[1].as_f64() / total_mass,
                totals[2].as_f64() / total_mass,
            ];
            for v in &mut self.atoms.velocities_mut()[..nlocal] {
                for d in 0..3 {
                    v[d] -= vcm[d];
                }
            }
        }

        let state = ThermoState::gather(self.comm, &self.atoms, 0.0)?;
        if state.temperature > 0.0 {
            let scale = (temperature / state.temperature).sqrt();
            for v in &mut self.atoms.velocities_mut()[..nlocal] {
                for d in 0..3 {
                    v[d] *= scale;
                }
            }
        }
        Ok(())
    }

    /// Collective: global thermodynamic state at the current step
    pub fn thermo_state(&mut self) -> Result<ThermoState, Error> {
        ThermoState::gather(self.comm, &self.atoms, self.potential_energy)
    }

    // Running

    fn stage(&self, stage: Stage) {
        trace!(step = self.step, ?stage);
    }

    /// Prepare plugins, size the halo and compute the initial forces
    pub fn setup(&mut self) -> Result<(), Error> {
        for plugin in self.plugins.values_mut() {
            plugin.setup(&mut SetupContext {
                domain: &self.domain,
                atoms: &mut self.atoms,
                timestep: self.timestep,
                special: self.neighbor.special(),
            })?;
        }
        self.hooks = HookLists::new(&self.plugins);

        let cutoff = self
            .plugins
            .values()
            .iter()
            .filter_map(|p| p.cutoff())
            .reduce(f64::max)
            .ok_or_else(|| Error::config("No plugin defines an interaction cutoff"))?;
        self.neighbor.set_cutoff(cutoff)?;
        self.partition
            .set_ghost_cutoff(&self.domain, self.neighbor.list_cutoff())?;

        self.rebuild(self.step)?;
        self.compute_forces(self.step)?;

        let step = self.step;
        for plugin in self.plugins.values_mut() {
            plugin.post_setup(&mut EndOfStepContext {
                step,
                timestep: self.timestep,
                domain: &self.domain,
                atoms: &self.atoms,
                comm: &mut *self.comm,
                potential_energy: self.potential_energy,
            })?;
        }
        self.is_setup = true;
        let natoms = self.comm.all_reduce_usize(self.atoms.nlocal(), Operation::Sum)?;
        info!(
            natoms,
            nlocal = self.atoms.nlocal(),
            nghost = self.atoms.nghost(),
            cutoff,
            ghost_cutoff = self.partition.ghost_cutoff(),
            "Setup complete"
        );
        Ok(())
    }

    /// Migrate atoms, rebuild the halo and the neighbor list
    fn rebuild(&mut self, step: usize) -> Result<(), Error> {
        self.stage(Stage::Migrate);
        let sent = self
            .partition
            .migrate(self.comm, &self.domain, &mut self.atoms)?;
        self.atoms_sent += sent;

        let sort_every = self.run_config.sort_every;
        if sort_every > 0 && self.neighbor.num_builds() % sort_every == 0 {
            self.stage(Stage::Sort);
            let positions = &self.atoms.positions()[..self.atoms.nlocal()];
            let bins = Bins::new(
                self.partition.subdomain().bounding_box(),
                0.5 * self.neighbor.list_cutoff(),
                positions,
            );
            let keys: Vec<usize> = positions.iter().map(|x| bins.coord_to_bin_idx(x)).collect();
            self.atoms.sort_owned_by(&keys);
        }

        self.stage(Stage::ExchangeGhosts);
        self.partition
            .exchange_ghosts(self.comm, &self.domain, &mut self.atoms)?;

        self.stage(Stage::RebuildNeighbors);
        let subdomain = self.partition.subdomain();
        let region = subdomain
            .bounding_box()
            .expanded(self.partition.ghost_cutoff());
        let volume = self.domain.volume() * (0..3).map(|d| subdomain.width(d)).product::<f64>();
        let (neighbor, atoms) = (&mut self.neighbor, &self.atoms);
        self.neighbor_list = self
            .pool
            .install(|| neighbor.build(step, atoms, &region, volume))?;
        debug!(
            step,
            sent,
            nlocal = self.atoms.nlocal(),
            nghost = self.atoms.nghost(),
            pairs = self.neighbor_list.len(),
            "Neighbor list rebuilt"
        );
        Ok(())
    }

    /// Zero forces, run every force plugin and fold ghost forces back to their owners
    fn compute_forces(&mut self, step: usize) -> Result<(), Error> {
        self.stage(Stage::PreForce);
        self.atoms.zero_forces();

        self.stage(Stage::ForceCompute);
        let (atoms, forces, fields) = self.atoms.split_forces();
        let mut ctx = ForceContext {
            step,
            domain: &self.domain,
            atoms,
            forces,
            fields,
            neighbors: &self.neighbor_list,
            special: self.neighbor.special(),
        };
        let plugins = &mut self.plugins;
        let order = &self.hooks.compute_force;
        self.potential_energy = self.pool.install(|| -> Result<f64, Error> {
            let mut energy = 0.0;
            for &idx in order {
                energy += plugins.value_at_mut(idx).compute_force(&mut ctx)?;
            }
            Ok(energy)
        })?;

        self.stage(Stage::ReverseComm);
        self.partition
            .reverse_communicate(self.comm, &mut self.atoms)?;
        Ok(())
    }

    fn run_step_hooks(&mut self, hook: Hooks, step: usize) -> Result<(), Error> {
        let order = match hook {
            Hooks::PRE_EXCHANGE => &self.hooks.pre_exchange,
            Hooks::POST_INTEGRATE => &self.hooks.post_integrate,
            Hooks::MODIFY_FORCE => &self.hooks.modify_force,
            _ => return Err(Error::config(format!("{:?} is not a step hook", hook))),
        };
        for &idx in order {
            let plugin = self.plugins.value_at_mut(idx);
            let mut ctx = StepContext {
                step,
                timestep: self.timestep,
                domain: &self.domain,
                atoms: &mut self.atoms,
            };
            let result = match hook {
                Hooks::PRE_EXCHANGE => plugin.pre_exchange(&mut ctx),
                Hooks::POST_INTEGRATE => plugin.post_integrate(&mut ctx),
                _ => plugin.modify_force(&mut ctx),
            };
            result?;
        }
        Ok(())
    }

    /// Advance one timestep. Runs setup first when needed.
    pub fn step(&mut self) -> Result<Control, Error> {
        if !self.is_setup {
            self.setup()?;
        }
        self.step += 1;
        let step = self.step;

        self.stage(Stage::InitialIntegrate);
        self.integrator
            .initial_integrate(&mut self.atoms, self.timestep);
        self.stage(Stage::PostIntegrate);
        self.run_step_hooks(Hooks::POST_INTEGRATE, step)?;

        let wants = self.neighbor.wants_rebuild(step, &self.atoms);
        if self.comm.any(wants)? {
            self.stage(Stage::PreExchange);
            self.run_step_hooks(Hooks::PRE_EXCHANGE, step)?;
            self.rebuild(step)?;
        } else {
            self.stage(Stage::ForwardComm);
            self.partition.forward_comm(self.comm, &mut self.atoms)?;
        }

        self.compute_forces(step)?;
        self.stage(Stage::PostForce);
        self.run_step_hooks(Hooks::MODIFY_FORCE, step)?;

        self.stage(Stage::FinalIntegrate);
        self.integrator
            .final_integrate(&mut self.atoms, self.timestep);

        self.stage(Stage::EndOfStep);
        let mut stop = false;
        for &idx in &self.hooks.end_of_step {
            let control = self.plugins.value_at_mut(idx).end_of_step(&mut EndOfStepContext {
                step,
                timestep: self.timestep,
                domain: &self.domain,
                atoms: &self.atoms,
                comm: &mut *self.comm,
                potential_energy: self.potential_energy,
            })?;
            stop |= control == Control::Stop;
        }
        if self.comm.any(stop)? {
            return Ok(Control::Stop);
        }
        Ok(Control::Continue)
    }

    /// Run `num_steps` steps, or until a plugin on any rank asks to stop
    pub fn run(&mut self, num_steps: usize) -> Result<RunSummary, Error> {
        if !self.is_setup {
            self.setup()?;
        }
        let builds = self.neighbor.num_builds();
        let sent = self.atoms_sent;
        if self.comm.is_root() {
            info!(steps = num_steps, from = self.step, "Run started");
        }
        let mut steps = 0;
        let mut stopped_early = false;
        while steps < num_steps {
            let control = self.step()?;
            steps += 1;
            if control == Control::Stop {
                stopped_early = steps < num_steps;
                break;
            }
        }
        let summary = RunSummary {
            steps,
            stopped_early,
            neighbor_builds: self.neighbor.num_builds() - builds,
            atoms_sent: self.atoms_sent - sent,
        };
        if self.comm.is_root() {
            info!(
                steps,
                stopped_early,
                neighbor_builds = summary.neighbor_builds,
                "Run finished"
            );
        }
        Ok(summary)
    }

    /// Run the step count from the run configuration
    pub fn run_configured(&mut self) -> Result<RunSummary, Error> {
        self.run(self.run_config.steps)
    }
}
