use glam::Vec3;

/// Omnidirectional light with distance attenuation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self {
            position,
            color,
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }

    pub fn with_attenuation(mut self, constant: f32, linear: f32, quadratic: f32) -> Self {
        self.constant = constant;
        self.linear = linear;
        self.quadratic = quadratic;
        self
    }
}

/// Cone light. Angles are half-angles in radians; `outer_cut_off` >= `cut_off`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Spotlight {
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub cut_off: f32,
    pub outer_cut_off: f32,
}

impl Spotlight {
    pub fn new(position: Vec3, direction: Vec3, color: Vec3, cut_off: f32, outer_cut_off: f32) -> Self {
        Self {
            position,
            direction: direction.normalize_or_zero(),
            color,
            cut_off: cut_off.min(outer_cut_off),
            outer_cut_off: outer_cut_off.max(cut_off),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Light {
    Point(PointLight),
    Spot(Spotlight),
}

impl Light {
    pub fn position(&self) -> Vec3 {
        match self {
            Light::Point(p) => p.position,
            Light::Spot(s) => s.position,
        }
    }

    pub fn color(&self) -> Vec3 {
        match self {
            Light::Point(p) => p.color,
            Light::Spot(s) => s.color,
        }
    }
}

impl From<PointLight> for Light {
    fn from(light: PointLight) -> Self {
        Light::Point(light)
    }
}

impl From<Spotlight> for Light {
    fn from(light: Spotlight) -> Self {
        Light::Spot(light)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spot_cones_are_ordered() {
        let s = Spotlight::new(Vec3::ZERO, Vec3::new(0.0, -2.0, 0.0), Vec3::ONE, 0.4, 0.2);
        assert_eq!(s.cut_off, 0.2);
        assert_eq!(s.outer_cut_off, 0.4);
        assert_eq!(s.direction, Vec3::NEG_Y);
    }
}
