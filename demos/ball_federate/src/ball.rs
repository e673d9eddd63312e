//! Ball entities moving at constant velocity

use federa_core::{
    AttributeCodec, AttributeState, EntityClassDefinition, Error, Result, UpdateRule,
};

/// Object class name for balls
pub const BALL_CLASS: &str = "BallEntity";

/// Class definition used when no catalog file is given
pub fn ball_class() -> EntityClassDefinition {
    EntityClassDefinition::new(BALL_CLASS)
        .with_attribute("PositionVector", AttributeCodec::Vector2)
        .with_attribute("VelocityVector", AttributeCodec::Vector2)
        .with_attribute("Radius", AttributeCodec::Integer)
}

/// Position, velocity and radius of one ball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BallRule {
    pub x: i64,
    pub y: i64,
    pub vx: i64,
    pub vy: i64,
    pub r: i64,
}

impl BallRule {
    /// Starting state of the `i`th ball in the demo
    pub fn nth(i: i64) -> Self {
        Self {
            x: i,
            y: i,
            vx: (5 * i) % 7,
            vy: (8 * i) % 11,
            r: 1,
        }
    }
}

impl UpdateRule for BallRule {
    fn advance(&mut self) {
        self.x += self.vx;
        self.y += self.vy;
    }

    fn write(&self, attributes: &mut AttributeState) -> Result<()> {
        if self.r <= 0 {
            return Err(Error::update(format!("ball radius must be positive, got {}", self.r)));
        }
        attributes.set("PositionVector", (self.x, self.y))?;
        attributes.set("VelocityVector", (self.vx, self.vy))?;
        attributes.set("Radius", self.r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use federa_core::{AttributeValue, EntityInstance};
    use std::sync::Arc;

    #[test]
    fn test_nth() {
        assert_eq!(BallRule::nth(0), BallRule { x: 0, y: 0, vx: 0, vy: 0, r: 1 });
        assert_eq!(BallRule::nth(3), BallRule { x: 3, y: 3, vx: 1, vy: 2, r: 1 });
    }

    #[test]
    fn test_advance() {
        let mut ball = BallRule::nth(2);
        ball.advance();
        ball.advance();
        assert_eq!((ball.x, ball.y), (2 + 2 * 3, 2 + 2 * 5));
    }

    #[test]
    fn test_unresolved_class_cannot_hold_balls() {
        let class = Arc::new(ball_class());
        assert!(EntityInstance::new(class, BallRule::nth(1)).is_err());
    }

    #[test]
    fn test_value_shapes() {
        let ball = BallRule::nth(4);
        assert_eq!(AttributeValue::from((ball.x, ball.y)), AttributeValue::Vector2(4, 4));
        assert_eq!(AttributeValue::from(ball.r), AttributeValue::Int(1));
    }
}
