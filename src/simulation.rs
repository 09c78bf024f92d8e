use crate::config::GeneratorConfig;
use crate::vecmath::Vec2;
use anyhow::Result;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A moving circle: position plus intrinsic velocity.
#[derive(Debug, Clone, Copy)]
pub struct Mover {
    pub pos: Vec2,
    pub vel: Vec2,
}

/// Manages the state and execution of the droplet simulation.
///
/// Droplets drift with an intrinsic velocity plus random jitter, get pulled
/// towards attraction points and pushed off repulsion points, resolve
/// pairwise overlap, avoid the larger droplet, and bounce off the screen
/// edges. Disappeared droplets stay allocated; only the live prefix of the
/// droplet vector is simulated and recorded.
pub struct DropletSimulation {
    config: GeneratorConfig,
    droplets: Vec<Mover>,
    live_droplets: usize,
    attractions: Vec<Mover>,
    repulsions: Vec<Mover>,
    larger_droplet: Option<Mover>,
    rng: StdRng,
}

impl DropletSimulation {
    /// Creates a new simulation, placing all entities from the seeded RNG.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.output.seed);
        let width = config.screen.width as f32;
        let height = config.screen.height as f32;

        let droplets = place_movers(
            &mut rng,
            config.droplets.count,
            config.droplets.radius,
            width,
            height,
            config
                .droplets
                .intrinsic_movement
                .then_some(config.droplets.max_intrinsic_velocity),
        );

        let attractions = if config.attraction.enabled {
            place_movers(
                &mut rng,
                config.attraction.count,
                config.attraction.radius,
                width,
                height,
                config.attraction.movement.then_some(config.attraction.speed),
            )
        } else {
            Vec::new()
        };

        let repulsions = if config.repulsion.enabled {
            place_movers(
                &mut rng,
                config.repulsion.count,
                config.repulsion.radius,
                width,
                height,
                config.repulsion.movement.then_some(config.repulsion.speed),
            )
        } else {
            Vec::new()
        };

        let larger_droplet = config.larger_droplet.enabled.then(|| Mover {
            pos: Vec2::new(width / 5.0, height / 2.0),
            vel: Vec2::new(config.larger_droplet.speed_x, config.larger_droplet.speed_y),
        });

        let live_droplets = droplets.len();
        Ok(Self {
            config,
            droplets,
            live_droplets,
            attractions,
            repulsions,
            larger_droplet,
            rng,
        })
    }

    /// Advances the simulation by one frame.
    pub fn step(&mut self) {
        if let Some(giant) = self.larger_droplet.as_mut() {
            giant.pos += giant.vel;
        }

        if self.config.droplets.disappearing
            && self.live_droplets > 0
            && self.rng.random::<f32>() < self.config.droplets.disappear_probability
        {
            self.live_droplets -= 1;
            debug!("Droplet disappeared; {} remain.", self.live_droplets);
        }

        self.move_droplets();

        let width = self.config.screen.width as f32;
        let height = self.config.screen.height as f32;
        if self.config.attraction.enabled && self.config.attraction.movement {
            bounce_points(&mut self.attractions, self.config.attraction.radius, width, height);
        }
        if self.config.repulsion.enabled && self.config.repulsion.movement {
            bounce_points(&mut self.repulsions, self.config.repulsion.radius, width, height);
        }
    }

    fn move_droplets(&mut self) {
        let width = self.config.screen.width as f32;
        let height = self.config.screen.height as f32;
        let radius = self.config.droplets.radius;
        let jitter = self.config.droplets.max_random_velocity;

        for i in 0..self.live_droplets {
            let Mover { mut pos, mut vel } = self.droplets[i];

            // Intrinsic velocity plus random jitter.
            pos += vel;
            if self.config.droplets.random_movement {
                pos += Vec2::new(
                    self.rng.random_range(-jitter..=jitter),
                    self.rng.random_range(-jitter..=jitter),
                );
            }

            // Pull towards attraction points within range.
            if self.config.attraction.enabled {
                let strength = self.config.attraction.strength;
                let reach = self.config.attraction.radius;
                for point in &self.attractions {
                    if pos.distance(point.pos) < reach {
                        pos += pos.direction_to(point.pos) * strength;
                    }
                }
            }

            // Push away from repulsion points within range.
            if self.config.repulsion.enabled {
                let strength = self.config.repulsion.strength;
                let reach = self.config.repulsion.radius;
                for point in &self.repulsions {
                    if pos.distance(point.pos) < reach {
                        pos += -(pos.direction_to(point.pos) * strength);
                    }
                }
            }

            // Resolve overlap by pushing the other droplet out to contact
            // distance.
            for j in 0..self.live_droplets {
                if j == i {
                    continue;
                }
                let other = self.droplets[j].pos;
                let dist = pos.distance(other);
                if dist < radius * 2.0 && dist > 0.0 {
                    self.droplets[j].pos = pos + pos.direction_to(other) * (radius * 2.0);
                }
            }

            // The larger droplet is impenetrable.
            if let Some(giant) = self.larger_droplet {
                let clearance = self.config.larger_droplet.radius + radius;
                if pos.distance(giant.pos) < clearance {
                    pos = giant.pos + giant.pos.direction_to(pos) * clearance;
                }
            }

            // Bounce off the screen edges.
            if pos.x < radius {
                pos.x = radius;
                vel.x = -vel.x;
            } else if pos.x > width - radius {
                pos.x = width - radius;
                vel.x = -vel.x;
            }
            if pos.y < radius {
                pos.y = radius;
                vel.y = -vel.y;
            } else if pos.y > height - radius {
                pos.y = height - radius;
                vel.y = -vel.y;
            }

            self.droplets[i] = Mover { pos, vel };
        }
    }

    /// Droplets still participating in the simulation.
    pub fn live_droplet_count(&self) -> usize {
        self.live_droplets
    }

    pub fn is_exhausted(&self) -> bool {
        self.live_droplets == 0
    }

    pub fn droplets(&self) -> &[Mover] {
        &self.droplets
    }

    pub fn attractions(&self) -> &[Mover] {
        &self.attractions
    }

    pub fn repulsions(&self) -> &[Mover] {
        &self.repulsions
    }

    pub fn larger_droplet(&self) -> Option<Mover> {
        self.larger_droplet
    }
}

/// Places `count` movers uniformly inside the screen with a `margin` border.
/// When `max_speed` is set, each mover gets a uniform random velocity in
/// `[-max_speed, max_speed]` per axis; otherwise it starts at rest.
fn place_movers(
    rng: &mut StdRng,
    count: u32,
    margin: f32,
    width: f32,
    height: f32,
    max_speed: Option<f32>,
) -> Vec<Mover> {
    (0..count)
        .map(|_| {
            let pos = Vec2::new(
                rng.random_range(margin..=width - margin),
                rng.random_range(margin..=height - margin),
            );
            let vel = match max_speed {
                Some(max) if max > 0.0 => {
                    Vec2::new(rng.random_range(-max..=max), rng.random_range(-max..=max))
                }
                _ => Vec2::zero(),
            };
            Mover { pos, vel }
        })
        .collect()
}

/// Moves focal points, reflecting their velocity at the screen border (kept
/// at `margin` distance so the full circle stays visible).
fn bounce_points(points: &mut [Mover], margin: f32, width: f32, height: f32) {
    for point in points {
        if point.pos.x < margin || point.pos.x > width - margin {
            point.vel.x = -point.vel.x;
        }
        if point.pos.y < margin || point.pos.y > height - margin {
            point.vel.y = -point.vel.y;
        }
        point.pos += point.vel;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;

    fn test_config(count: u32) -> GeneratorConfig {
        let text = format!(
            r#"
[screen]
width = 200
height = 160

[timing]
number_of_frames = 100
number_of_recordings = 10

[droplets]
count = {count}
radius = 5.0

[output]
seed = 7
"#
        );
        toml::from_str(&text).unwrap()
    }

    #[test]
    fn single_droplet_stays_within_bounds() {
        let config = test_config(1);
        let mut sim = DropletSimulation::new(config).unwrap();
        for _ in 0..200 {
            sim.step();
        }
        let droplet = sim.droplets()[0];
        assert!(droplet.pos.x >= 5.0 && droplet.pos.x <= 195.0);
        assert!(droplet.pos.y >= 5.0 && droplet.pos.y <= 155.0);
    }

    #[test]
    fn same_seed_is_deterministic() {
        let mut a = DropletSimulation::new(test_config(12)).unwrap();
        let mut b = DropletSimulation::new(test_config(12)).unwrap();
        for _ in 0..50 {
            a.step();
            b.step();
        }
        for (da, db) in a.droplets().iter().zip(b.droplets()) {
            assert_eq!(da.pos, db.pos);
            assert_eq!(da.vel, db.vel);
        }
    }

    #[test]
    fn certain_disappearance_drains_the_population() {
        let mut config = test_config(4);
        config.droplets.disappearing = true;
        config.droplets.disappear_probability = 1.0;
        let mut sim = DropletSimulation::new(config).unwrap();

        for expected in (0..4).rev() {
            sim.step();
            assert_eq!(sim.live_droplet_count(), expected);
        }
        assert!(sim.is_exhausted());
    }
}
