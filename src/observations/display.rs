//! Human-readable one-line rendering of observations.

use std::fmt;

use crate::observations::gnss_baseline::ComponentType;
use crate::observations::{FaceType, Observation, ObservationModel, ObservationType};

impl fmt::Display for ObservationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObservationType::Direction => "direction",
            ObservationType::ZenithAngle => "zenith angle",
            ObservationType::HorizontalDistance => "horizontal distance",
            ObservationType::SlopeDistance => "slope distance",
            ObservationType::Leveling => "leveling",
            ObservationType::Gnss1D => "gnss 1d",
            ObservationType::Gnss2D => "gnss 2d",
            ObservationType::Gnss3D => "gnss 3d",
        };
        f.write_str(s)
    }
}

impl fmt::Display for FaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaceType::One => f.write_str("I"),
            FaceType::Two => f.write_str("II"),
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentType::X => f.write_str("dX"),
            ComponentType::Y => f.write_str("dY"),
            ComponentType::Z => f.write_str("dZ"),
        }
    }
}

/// Format an observation as `type id start->end apriori`.
///
/// Points are shown by their handle because an observation does not own the point names;
/// use [`Network::describe`](crate::network::Network::describe) for a named rendering.
impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core();
        write!(
            f,
            "{} {} #{}->#{} {:.6}",
            self.observation_type(),
            core.id(),
            core.start_point().0,
            core.end_point().0,
            core.value_apriori()
        )?;
        match self {
            Observation::GnssBaseline(g) => write!(f, " [{}]", g.component()),
            Observation::ZenithAngle(z) if z.face() == FaceType::Two => write!(f, " [face II]"),
            Observation::Direction(d) if d.face() == FaceType::Two => write!(f, " [face II]"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod display_test {
    use crate::network::Network;
    use crate::point::Point;

    #[test]
    fn test_one_line_format() {
        let mut net = Network::new();
        net.add_point(Point::new("S", 0.0, 0.0, 0.0)).unwrap();
        net.add_point(Point::new("E", 10.0, 0.0, 0.0)).unwrap();
        let d = net.add_horizontal_distance(4, "S", "E", 0.0, 0.0, 10.0).unwrap();
        let [x, _] = net
            .add_gnss_baseline_2d(5, "S", "E", 0.0, 0.0, 10.0, 0.0)
            .unwrap();

        let obs = net.observation(d).unwrap();
        assert_eq!(obs.to_string(), "horizontal distance 4 #0->#1 10.000000");
        assert_eq!(net.describe(d).unwrap(), "horizontal distance 4 S->E 10.000000");
        assert_eq!(
            net.observation(x).unwrap().to_string(),
            "gnss 2d 5 #0->#1 10.000000 [dX]"
        );
    }
}
