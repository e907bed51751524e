//! Scene contents as `hecs` entities.
//!
//! Models, lights, render passes and the environment texture are all
//! entities tagged with a [`Role`]. Teardown walks the world and tallies
//! what it released, so callers and tests can see nothing was missed.

use glam::{Vec2, Vec3};
use hecs::{Entity, World};

use crate::assets::{MaterialKind, ModelAsset, TextureSlot};

/// What an entity is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Screen,
    EmbedProjection,
    Glass,
    Room,
    ApproachModel,
    WorldModel,
    InsideModel,
    Environment,
    Light,
    Pass,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Name(pub String);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position(pub Vec3);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub vertex_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Emissive {
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub kind: MaterialKind,
    pub color: Vec3,
    pub textures: Vec<TextureSlot>,
    pub emissive: Option<Emissive>,
    pub opacity: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    Ambient,
    Hemisphere,
    Directional,
    Spot,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub intensity: f32,
    /// Shadow map edge length, when the light casts shadows.
    pub shadow_map: Option<u32>,
}

/// A texture owned directly by the scene rather than by a material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneTexture {
    pub size: (u32, u32),
}

/// A post-processing or composition pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderPass;

/// The flat page projected into the desk scene, in world units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Panel {
    pub size: Vec2,
}

/// Resources released by a teardown or removal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisposalReport {
    pub entities: usize,
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
    pub shadow_maps: usize,
    pub passes: usize,
    pub timers_cancelled: usize,
    pub listeners_removed: usize,
    pub surface_released: bool,
}

impl DisposalReport {
    pub fn merge(&mut self, other: DisposalReport) {
        self.entities += other.entities;
        self.geometries += other.geometries;
        self.materials += other.materials;
        self.textures += other.textures;
        self.shadow_maps += other.shadow_maps;
        self.passes += other.passes;
        self.timers_cancelled += other.timers_cancelled;
        self.listeners_removed += other.listeners_removed;
        self.surface_released |= other.surface_released;
    }
}

#[derive(Default)]
pub struct SceneGraph {
    world: World,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.world.len() == 0
    }

    /// Add every mesh of `model` as an entity with the given role.
    pub fn spawn_model(&mut self, role: Role, model: &ModelAsset, position: Vec3) -> Vec<Entity> {
        model
            .meshes
            .iter()
            .map(|mesh| {
                self.world.spawn((
                    role,
                    Name(mesh.name.clone()),
                    Position(position),
                    Geometry {
                        vertex_count: mesh.vertex_count,
                    },
                    Material {
                        kind: mesh.material.kind,
                        color: mesh.material.color,
                        textures: mesh.material.textures.clone(),
                        emissive: None,
                        opacity: 1.0,
                    },
                ))
            })
            .collect()
    }

    pub fn spawn_light(&mut self, name: &str, light: Light, position: Vec3) -> Entity {
        self.world
            .spawn((Role::Light, Name(name.to_owned()), Position(position), light))
    }

    pub fn spawn_pass(&mut self, name: &str) -> Entity {
        self.world.spawn((Role::Pass, Name(name.to_owned()), RenderPass))
    }

    pub fn spawn_environment(&mut self, size: (u32, u32)) -> Entity {
        self.world
            .spawn((Role::Environment, Name("environment".into()), SceneTexture { size }))
    }

    /// The embedded page and the glass pane in front of it.
    pub fn spawn_embed(&mut self, size: Vec2, position: Vec3) {
        self.world.spawn((
            Role::EmbedProjection,
            Name("embed".into()),
            Position(position),
            Panel { size },
        ));
        self.world.spawn((
            Role::Glass,
            Name("glass".into()),
            Position(position),
            Geometry { vertex_count: 4 },
            Material {
                kind: MaterialKind::Physical,
                color: Vec3::ONE,
                textures: Vec::new(),
                emissive: None,
                opacity: 0.15,
            },
        ));
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.entities_with(role).next().is_some()
    }

    fn entities_with(&self, role: Role) -> impl Iterator<Item = Entity> + '_ {
        self.world
            .query::<&Role>()
            .iter()
            .filter(|(_, r)| **r == role)
            .map(|(e, _)| e)
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Position of the first entity with `role`.
    pub fn position(&self, role: Role) -> Option<Vec3> {
        self.world
            .query::<(&Role, &Position)>()
            .iter()
            .find(|(_, (r, _))| **r == role)
            .map(|(_, (_, p))| p.0)
    }

    pub fn set_position(&mut self, role: Role, position: Vec3) {
        for (_, (r, p)) in self.world.query_mut::<(&Role, &mut Position)>() {
            if *r == role {
                p.0 = position;
            }
        }
    }

    /// Set the intensity of every light of `kind`, returning how many
    /// lights changed.
    pub fn set_light_intensity(&mut self, kind: LightKind, intensity: f32) -> usize {
        let mut changed = 0;
        for (_, light) in self.world.query_mut::<&mut Light>() {
            if light.kind == kind {
                light.intensity = intensity;
                changed += 1;
            }
        }
        changed
    }

    pub fn light_intensity(&self, kind: LightKind) -> Option<f32> {
        self.world
            .query::<&Light>()
            .iter()
            .find(|(_, l)| l.kind == kind)
            .map(|(_, l)| l.intensity)
    }

    /// Give every lit material of `role` an emissive tint. Returns how many
    /// materials were changed.
    pub fn apply_emissive(&mut self, role: Role, emissive: Emissive) -> usize {
        let mut changed = 0;
        for (_, (r, material)) in self.world.query_mut::<(&Role, &mut Material)>() {
            if *r == role && material.kind.is_lit() {
                material.emissive = Some(emissive);
                changed += 1;
            }
        }
        changed
    }

    pub fn emissive(&self, role: Role) -> Option<Emissive> {
        self.world
            .query::<(&Role, &Material)>()
            .iter()
            .find(|(_, (r, _))| **r == role)
            .and_then(|(_, (_, m))| m.emissive)
    }

    fn tally(&self, entities: &[Entity]) -> DisposalReport {
        let mut report = DisposalReport::default();
        for &entity in entities {
            let Ok(entity) = self.world.entity(entity) else {
                continue;
            };
            report.entities += 1;
            if entity.has::<Geometry>() {
                report.geometries += 1;
            }
            if let Some(material) = entity.get::<&Material>() {
                report.materials += 1;
                report.textures += material.textures.len();
            }
            if entity.has::<SceneTexture>() {
                report.textures += 1;
            }
            if let Some(light) = entity.get::<&Light>() {
                report.shadow_maps += light.shadow_map.is_some() as usize;
            }
            if entity.has::<RenderPass>() {
                report.passes += 1;
            }
        }
        report
    }

    fn despawn_all(&mut self, entities: &[Entity]) -> DisposalReport {
        let report = self.tally(entities);
        for &entity in entities {
            // Already gone is fine; removal is idempotent.
            let _ = self.world.despawn(entity);
        }
        report
    }

    /// Remove every entity with `role`. Removing a role that is not present
    /// does nothing.
    pub fn remove_role(&mut self, role: Role) -> DisposalReport {
        let entities: Vec<Entity> = self.entities_with(role).collect();
        self.despawn_all(&entities)
    }

    /// Release everything in the scene.
    pub fn dispose_all(&mut self) -> DisposalReport {
        let entities: Vec<Entity> = self.world.iter().map(|e| e.entity()).collect();
        let report = self.despawn_all(&entities);
        self.world.clear();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{MaterialAsset, MeshAsset};

    fn model(textures: Vec<TextureSlot>, kind: MaterialKind) -> ModelAsset {
        ModelAsset {
            path: "m.stl".into(),
            meshes: vec![
                MeshAsset {
                    name: "a".into(),
                    vertex_count: 3,
                    triangle_count: 1,
                    material: MaterialAsset {
                        kind,
                        color: Vec3::ONE,
                        textures,
                    },
                },
                MeshAsset {
                    name: "b".into(),
                    vertex_count: 6,
                    triangle_count: 2,
                    material: MaterialAsset::default(),
                },
            ],
            bounds_min: Vec3::ZERO,
            bounds_max: Vec3::ONE,
        }
    }

    #[test]
    fn dispose_counts_nested_textures_and_shadow_maps() {
        let mut graph = SceneGraph::new();
        graph.spawn_model(
            Role::WorldModel,
            &model(vec![TextureSlot::Map, TextureSlot::NormalMap], MaterialKind::Standard),
            Vec3::ZERO,
        );
        graph.spawn_light(
            "sun",
            Light {
                kind: LightKind::Directional,
                intensity: 1.5,
                shadow_map: Some(2048),
            },
            Vec3::Y,
        );
        graph.spawn_light(
            "sky",
            Light {
                kind: LightKind::Hemisphere,
                intensity: 0.8,
                shadow_map: None,
            },
            Vec3::Y,
        );
        graph.spawn_environment((64, 64));
        graph.spawn_pass("bloom");

        let report = graph.dispose_all();
        assert_eq!(report.entities, 6);
        assert_eq!(report.geometries, 2);
        assert_eq!(report.materials, 2);
        assert_eq!(report.textures, 3);
        assert_eq!(report.shadow_maps, 1);
        assert_eq!(report.passes, 1);
        assert!(graph.is_empty());
        assert_eq!(graph.dispose_all(), DisposalReport::default());
    }

    #[test]
    fn removing_the_embed_is_idempotent() {
        let mut graph = SceneGraph::new();
        graph.spawn_embed(Vec2::new(1.0, 0.75), Vec3::ZERO);
        let projection = graph.remove_role(Role::EmbedProjection);
        assert_eq!(projection.entities, 1);
        assert_eq!(projection.materials, 0);
        assert_eq!(graph.remove_role(Role::Glass).materials, 1);
        assert_eq!(graph.remove_role(Role::EmbedProjection), DisposalReport::default());
        assert_eq!(graph.remove_role(Role::Glass), DisposalReport::default());
        assert!(graph.is_empty());
    }

    #[test]
    fn emissive_only_touches_lit_materials() {
        let mut graph = SceneGraph::new();
        graph.spawn_model(Role::InsideModel, &model(Vec::new(), MaterialKind::Basic), Vec3::ZERO);
        let glow = Emissive {
            color: Vec3::ONE,
            intensity: 0.45,
        };
        assert_eq!(graph.apply_emissive(Role::InsideModel, glow), 1);
    }

    #[test]
    fn moves_every_mesh_of_a_model() {
        let mut graph = SceneGraph::new();
        graph.spawn_model(Role::InsideModel, &model(Vec::new(), MaterialKind::Standard), Vec3::ZERO);
        graph.set_position(Role::InsideModel, Vec3::new(0.0, -10.0, 0.0));
        let positions: Vec<Vec3> = graph
            .world
            .query::<(&Role, &Position)>()
            .iter()
            .map(|(_, (_, p))| p.0)
            .collect();
        assert_eq!(positions, vec![Vec3::new(0.0, -10.0, 0.0); 2]);
    }
}
