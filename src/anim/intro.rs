//! Assembly intro and the ambient idle loops.
//!
//! The table rises into place first; everything else pops in once it has
//! landed. Smoke drift and mouse sway loop forever and are cancelled in bulk
//! at teardown.

use glam::Vec3;

use super::{Animator, Axis, Completion, Ease, Property, Repeat, TweenSpec};
use crate::scene::{MeshId, MeshRole, SceneGraph};

/// When the non-table meshes start popping in.
pub const POP_START: f32 = 1.2;

const TABLE_DROP: f32 = 5.0;
const TABLE_TILT: f32 = 0.5;

/// Static material tweaks for the smoke and the cup.
pub fn apply_resting_looks(scene: &mut SceneGraph) {
    for id in scene.mesh_ids() {
        let role = scene.role(id);
        let Some(mesh) = scene.mesh_mut(id) else {
            continue;
        };
        let material = &mut mesh.material;
        match role {
            MeshRole::Smoke => {
                material.transparent = true;
                material.opacity = 0.5;
                material.depth_write = false;
            }
            MeshRole::Cup => {
                material.transparent = true;
                material.opacity = 0.8;
                material.depth_write = false;
            }
            _ => {}
        }
    }
}

fn end_time(spec: &TweenSpec) -> f32 {
    let cycles = match spec.repeat {
        Repeat::Count(n) => n as f32 + 1.0,
        Repeat::Infinite => f32::INFINITY,
    };
    spec.delay + spec.duration * cycles
}

/// Collapses every mesh and schedules the intro. Returns the number of
/// tweens started. A separate timer reports [`Completion::AssemblyFinished`]
/// when the longest of them ends, so cancelling any single tween (a hover
/// grow, say) cannot swallow it. With no meshes nothing is scheduled and the
/// caller should consider the assembly finished.
pub fn start_assembly(scene: &mut SceneGraph, animator: &mut Animator) -> usize {
    let mut specs: Vec<TweenSpec> = Vec::new();
    for id in scene.mesh_ids() {
        let role = scene.role(id);
        let Some(original) = scene.record(id).map(|record| record.original) else {
            continue;
        };
        let Some(mesh) = scene.mesh_mut(id) else {
            continue;
        };
        mesh.transform.scale = Vec3::ZERO;

        if role == MeshRole::Table {
            mesh.transform.position.y = original.position.y - TABLE_DROP;
            mesh.transform.rotation.x = original.rotation.x - TABLE_TILT;
            specs.extend(table_rise(id, original.position.y, original.rotation.x, original.scale));
            continue;
        }

        let fade = matches!(role, MeshRole::Smoke | MeshRole::Cup | MeshRole::Coffee);
        let resting_opacity = mesh.material.opacity;
        if fade {
            mesh.material.transparent = true;
            mesh.material.opacity = 0.0;
        }
        specs.extend(pop_in(id, role, original.scale, original.rotation.z, fade, resting_opacity));
    }

    if specs.is_empty() {
        return 0;
    }
    let finish = specs.iter().map(end_time).fold(0.0, f32::max);
    let count = specs.len();
    for spec in specs {
        animator.start(spec);
    }
    animator.start(TweenSpec::after(finish, Completion::AssemblyFinished));
    log::debug!("Assembly scheduled with {} tween(s), done at {:.2}s", count, finish);
    count
}

fn table_rise(id: MeshId, y: f32, tilt: f32, scale: Vec3) -> [TweenSpec; 3] {
    [
        TweenSpec::to(Property::MeshPosition(id, Axis::Y), y)
            .duration(1.2)
            .ease(Ease::BackOut(1.2)),
        TweenSpec::to(Property::MeshScale(id), scale)
            .duration(1.2)
            .ease(Ease::BackOut(1.2)),
        TweenSpec::to(Property::MeshRotation(id, Axis::X), tilt)
            .duration(1.2)
            .ease(Ease::BackOut(1.5)),
    ]
}

fn pop_in(
    id: MeshId,
    role: MeshRole,
    scale: Vec3,
    roll: f32,
    fade: bool,
    opacity: f32,
) -> Vec<TweenSpec> {
    let mut specs = Vec::new();
    let grow = if role == MeshRole::Coffee {
        TweenSpec::to(Property::MeshScale(id), scale)
            .duration(0.4)
            .ease(Ease::BackOut(1.5))
    } else {
        TweenSpec::to(Property::MeshScale(id), scale)
            .duration(0.5)
            .ease(Ease::BackOut(1.7))
    };
    specs.push(grow.delay(POP_START));

    if fade {
        let ease = if role == MeshRole::Coffee {
            Ease::Power1Out
        } else {
            Ease::SineOut
        };
        specs.push(
            TweenSpec::to(Property::MaterialOpacity(id), opacity)
                .delay(POP_START)
                .duration(0.3)
                .ease(ease),
        );
    }

    if role == MeshRole::Cup {
        specs.push(
            TweenSpec::to(Property::MeshRotation(id, Axis::Z), roll + 0.1)
                .delay(POP_START + 0.3)
                .duration(0.2)
                .repeat(Repeat::Count(1))
                .yoyo(true)
                .ease(Ease::SineInOut),
        );
    }
    specs
}

/// Puts every mesh back on its snapshot transform without animating.
pub fn skip_assembly(scene: &mut SceneGraph) {
    for id in scene.mesh_ids() {
        let Some(original) = scene.record(id).map(|record| record.original) else {
            continue;
        };
        if let Some(mesh) = scene.mesh_mut(id) {
            mesh.transform = original;
        }
    }
}

fn idle_loop(spec: TweenSpec) -> TweenSpec {
    spec.duration(0.5)
        .repeat(Repeat::Infinite)
        .yoyo(true)
        .ease(Ease::SineInOut)
}

/// Starts the smoke drift and mouse sway. Returns the number of loops.
pub fn start_idle_loops(scene: &SceneGraph, animator: &mut Animator) -> usize {
    let mut started = 0;
    for id in scene.meshes_with_role(MeshRole::Smoke) {
        animator.start(idle_loop(TweenSpec::by(Property::MeshPosition(id, Axis::Y), 1.5)));
        animator.start(idle_loop(TweenSpec::by(Property::MeshRotation(id, Axis::Z), 1.3)));
        started += 2;
    }
    for id in scene.meshes_with_role(MeshRole::Mouse) {
        animator.start(idle_loop(TweenSpec::by(Property::MeshPosition(id, Axis::X), 6.25)));
        started += 1;
    }
    log::debug!("Started {} idle loop(s)", started);
    started
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::Target;
    use crate::scene::test_support::add_quad_mesh;

    fn desk() -> (SceneGraph, MeshId, MeshId, MeshId) {
        let mut scene = SceneGraph::new();
        let table = add_quad_mesh(&mut scene, "tavolo", Vec3::new(0.0, 0.5, 0.0), MeshRole::Table);
        let cup = add_quad_mesh(&mut scene, "tazza", Vec3::new(0.3, 1.0, 0.0), MeshRole::Cup);
        let smoke = add_quad_mesh(&mut scene, "fumo", Vec3::new(0.3, 1.2, 0.0), MeshRole::Smoke);
        add_quad_mesh(&mut scene, "mouse", Vec3::new(-0.4, 1.0, 0.0), MeshRole::Mouse);
        (scene, table, cup, smoke)
    }

    fn run(scene: &mut SceneGraph, animator: &mut Animator, secs: f32) -> Vec<Completion> {
        let mut completions = Vec::new();
        let steps = (secs / 0.02).ceil() as usize;
        for _ in 0..steps {
            completions.extend(animator.advance(0.02, scene));
        }
        completions
    }

    #[test]
    fn assembly_lands_on_the_original_transforms() {
        let (mut scene, table, cup, smoke) = desk();
        apply_resting_looks(&mut scene);
        let mut animator = Animator::new();
        assert!(start_assembly(&mut scene, &mut animator) > 0);

        let mesh = scene.mesh(table).unwrap();
        assert_eq!(mesh.transform.position.y, 0.5 - TABLE_DROP);
        assert_eq!(mesh.transform.scale, Vec3::ZERO);
        assert_eq!(scene.mesh(cup).unwrap().material.opacity, 0.0);

        let completions = run(&mut scene, &mut animator, 2.5);
        assert_eq!(completions, vec![Completion::AssemblyFinished]);
        assert!(animator.is_empty());
        for id in scene.mesh_ids() {
            let original = scene.record(id).unwrap().original;
            assert_eq!(scene.mesh(id).unwrap().transform, original);
        }
        assert_eq!(scene.mesh(cup).unwrap().material.opacity, 0.8);
        assert_eq!(scene.mesh(smoke).unwrap().material.opacity, 0.5);
        assert!(!scene.mesh(smoke).unwrap().material.depth_write);
    }

    #[test]
    fn cancelled_pop_in_still_finishes_the_assembly() {
        let (mut scene, _, cup, _) = desk();
        let mut animator = Animator::new();
        start_assembly(&mut scene, &mut animator);
        run(&mut scene, &mut animator, 1.4);
        animator.kill_tweens_of(Target::MeshScale(cup));
        animator.kill_tweens_of(Target::MeshRotation(cup));
        let completions = run(&mut scene, &mut animator, 1.5);
        assert_eq!(completions, vec![Completion::AssemblyFinished]);
    }

    #[test]
    fn empty_scene_schedules_nothing() {
        let mut scene = SceneGraph::new();
        let mut animator = Animator::new();
        assert_eq!(start_assembly(&mut scene, &mut animator), 0);
        assert!(animator.is_empty());
    }

    #[test]
    fn idle_loops_are_registered_for_bulk_cancel() {
        let (scene, ..) = desk();
        let mut animator = Animator::new();
        assert_eq!(start_idle_loops(&scene, &mut animator), 3);
        assert_eq!(animator.looping_handles().count(), 3);
        assert_eq!(animator.cancel_looping(), 3);
        assert!(animator.is_empty());
    }

    #[test]
    fn smoke_drifts_relative_to_where_it_started() {
        let (mut scene, _, _, smoke) = desk();
        let mut animator = Animator::new();
        start_idle_loops(&scene, &mut animator);
        // Half a cycle puts the smoke at the top of its drift.
        run(&mut scene, &mut animator, 0.5 - 0.02);
        let y = scene.mesh(smoke).unwrap().transform.position.y;
        assert!(y > 2.5 && y < 2.71, "y = {y}");
    }
}
