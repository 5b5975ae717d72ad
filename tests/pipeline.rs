mod common;

use std::any::Any;

use approx::assert_relative_eq;
use common::*;
use ddmd::{
    atoms::{AtomStore, FloatField},
    compute::Quantity,
    config::SimConfig,
    neighbor::ListPolicy,
    parallel::Universe,
    plugin::{Control, EndOfStepContext, Hooks, Plugin, SetupContext},
    registry::StyleRegistry,
    styles::{Halt, Thermo, Viscous},
    Error, Simulation,
};

const TAG_FIELD: &str = "echo/tag";

/// Stores each atom's tag in a per-atom field and checks, after every
/// step, that owned and ghost copies still match the atom they belong to
#[derive(Debug, Default)]
struct TagEcho {
    checked: usize,
    mismatches: usize,
}
impl Plugin for TagEcho {
    fn id(&self) -> &str {
        "echo"
    }
    fn style(&self) -> &str {
        "echo"
    }
    fn hooks(&self) -> Hooks {
        Hooks::END_OF_STEP
    }
    fn setup(&mut self, ctx: &mut SetupContext) -> Result<(), Error> {
        if ctx.atoms.field::<FloatField>(TAG_FIELD).is_none() {
            ctx.atoms
                .register_field(TAG_FIELD, Box::new(FloatField::new(1).with_ghosts()))?;
        }
        let tags = ctx.atoms.tags()[..ctx.atoms.nlocal()].to_vec();
        let field = ctx
            .atoms
            .field_mut::<FloatField>(TAG_FIELD)
            .ok_or_else(|| Error::plugin("echo", "field missing"))?;
        for (i, tag) in tags.into_iter().enumerate() {
            field.set(i, &[tag as f64]);
        }
        Ok(())
    }
    fn end_of_step(&mut self, ctx: &mut EndOfStepContext) -> Result<Control, Error> {
        let field = ctx
            .atoms
            .field::<FloatField>(TAG_FIELD)
            .ok_or_else(|| Error::plugin("echo", "field missing"))?;
        for (i, &tag) in ctx.atoms.tags().iter().enumerate() {
            self.checked += 1;
            if field.get(i)[0] != tag as f64 {
                self.mismatches += 1;
            }
        }
        Ok(Control::Continue)
    }
    fn teardown(&mut self, atoms: &mut AtomStore) {
        atoms.unregister_field(TAG_FIELD);
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[test]
fn per_atom_fields_follow_their_atoms() {
    let domain = periodic_box(10.0);
    let atoms = spaced_atoms(&domain, 100, 1.1, 5);
    let mut config = lj_config(Some([2, 2, 1]), ListPolicy::Half);
    config.neighbor.check = false;
    let results = Universe::run(4, |comm| {
        let mut sim = lj_simulation(comm, &domain, &config, &atoms)?;
        sim.set_temperature(3.0, 9)?;
        sim.add_plugin(Box::new(TagEcho::default()))?;
        let summary = sim.run(100)?;
        let echo = sim
            .plugin::<TagEcho>("echo")
            .map(|e| (e.checked, e.mismatches))
            .unwrap_or_default();

        let removed = sim.remove_plugin("echo")?;
        assert_eq!(removed.id(), "echo");
        assert!(sim.atoms().field::<FloatField>(TAG_FIELD).is_none());
        assert!(sim.remove_plugin("echo").is_err());
        Ok((summary.atoms_sent, echo))
    })
    .unwrap();

    let sent: usize = results.iter().map(|r| r.0).sum();
    assert!(sent > 0, "no atom changed rank");
    for (_, (checked, mismatches)) in results {
        assert!(checked > 0);
        assert_eq!(mismatches, 0);
    }
}

#[test]
fn halt_stops_every_rank_on_the_same_step() {
    let domain = periodic_box(10.0);
    let atoms = spaced_atoms(&domain, 50, 1.1, 1);
    let config = lj_config(None, ListPolicy::Half);
    let results = Universe::run(2, |comm| {
        let mut sim = lj_simulation(comm, &domain, &config, &atoms)?;
        sim.add_plugin(Box::new(Halt::new("stop", 1, Quantity::Step, Some(4.5), None)?))?;
        let summary = sim.run(100)?;
        let halted_at = sim.plugin::<Halt>("stop").and_then(|h| h.halted_at());
        Ok((summary.steps, summary.stopped_early, sim.current_step(), halted_at))
    })
    .unwrap();
    for r in results {
        assert_eq!(r, (5, true, 5, Some(5)));
    }
}

#[test]
fn viscous_damping_removes_kinetic_energy() {
    let domain = periodic_box(10.0);
    let atoms = spaced_atoms(&domain, 80, 1.2, 2);
    let config = lj_config(None, ListPolicy::Half);
    let kinetic = Universe::run(2, |comm| {
        let mut sim = lj_simulation(comm, &domain, &config, &atoms)?;
        sim.add_plugin(Box::new(Viscous::new("drag", 5.0)?))?;
        sim.add_plugin(Box::new(Thermo::new("thermo", 10, vec![Quantity::Step, Quantity::Ke])?))?;
        sim.run(100)?;
        let thermo = sim
            .plugin::<Thermo>("thermo")
            .ok_or_else(|| Error::config("thermo missing"))?;
        Ok(thermo
            .history()
            .iter()
            .map(|(step, s)| (*step, s.kinetic_energy))
            .collect::<Vec<_>>())
    })
    .unwrap();
    let history = &kinetic[0];
    assert_eq!(history.len(), 11);
    assert_eq!(history[0].0, 0);
    assert_eq!(history[10].0, 100);
    assert!(history[10].1 < 0.5 * history[0].1);
    assert_eq!(kinetic[0], kinetic[1]);
}

const RUN_YAML: &str = r#"
timestep: 0.005
domain:
  hi: [9.0, 9.0, 9.0]
create:
  - kind: lattice
    spacing: 1.5
velocity:
  temperature: 1.0
  seed: 3
comm:
  grid: [2, 1, 1]
run:
  steps: 20
styles:
  - id: pair
    style: lj/cut
    params:
      cutoff: 2.5
      shift: true
  - id: thermo
    style: thermo
    params:
      every: 5
  - id: stop
    style: halt
    params:
      quantity: step
      above: 7.5
"#;

#[test]
fn configured_run_from_yaml() {
    let config = SimConfig::from_yaml(RUN_YAML).unwrap();
    let registry = StyleRegistry::default();
    let results = Universe::run(2, |comm| {
        let mut sim = Simulation::from_config(comm, &config, &registry)?;
        assert_eq!(sim.plugin_ids(), ["pair", "thermo", "stop"]);
        let summary = sim.run_configured()?;
        let thermo = sim
            .plugin::<Thermo>("thermo")
            .ok_or_else(|| Error::config("thermo missing"))?;
        let first = thermo.history()[0].1;
        Ok((summary.steps, summary.stopped_early, thermo.history().len(), first.natoms, first.temperature))
    })
    .unwrap();
    for (steps, stopped_early, records, natoms, temperature) in results {
        assert_eq!(steps, 8);
        assert!(stopped_early);
        // Steps 0 and 5
        assert_eq!(records, 2);
        assert_eq!(natoms, 216);
        assert_relative_eq!(temperature, 1.0, max_relative = 1e-10);
    }
}

#[test]
fn thermo_every_adds_a_thermo_plugin() {
    let yaml = "domain: { hi: [6.0, 6.0, 6.0] }\ncreate:\n  - kind: lattice\n    spacing: 1.5\nrun: { steps: 4, thermo_every: 2 }\nstyles:\n  - id: pair\n    style: lj/cut\n";
    let config = SimConfig::from_yaml(yaml).unwrap();
    let registry = StyleRegistry::default();
    let records = Universe::run(1, |comm| {
        let mut sim = Simulation::from_config(comm, &config, &registry)?;
        sim.run_configured()?;
        let thermo = sim
            .plugin::<Thermo>("thermo")
            .ok_or_else(|| Error::config("thermo missing"))?;
        Ok(thermo.history().iter().map(|(step, _)| *step).collect::<Vec<_>>())
    })
    .unwrap();
    assert_eq!(records[0], vec![0, 2, 4]);
}
