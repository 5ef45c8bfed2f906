//! Fixed user-facing feedback, keyed by exercise and verdict status

use crate::VerdictStatus;

pub const UNDETECTED_FEEDBACK: &str = "I can't clearly see your full body. Step back a little and ensure your body is inside the camera frame.";

const SQUAT_CORRECT: &str = "Great squat form! Keep your chest up, knees aligned with your toes, and control the movement as you go down and up.";
const SQUAT_INCORRECT: &str = "Try to improve your squat: keep your back straight, push your hips back like sitting on a chair, and avoid letting your knees collapse inward.";
const GENERIC_CORRECT: &str = "Good posture detected. Maintain this form throughout the movement.";
const GENERIC_INCORRECT: &str = "Your posture needs some adjustment. Move slowly and focus on alignment.";

/// Exercises the client offers that have no trained model
const KNOWN_EXERCISES: [(&str, &str); 3] = [
    ("shoulder-abduction", "Shoulder abduction"),
    ("knee-flexion", "Knee flexion"),
    ("arm-raise", "Arm raise"),
];

/// Feedback for a verdict
///
/// `trained` is the exercise the classifier was trained for; it only shapes
/// the note attached to out-of-domain requests.
#[must_use]
pub fn feedback_for(exercise: &str, status: VerdictStatus, trained: &str) -> String {
    match status {
        VerdictStatus::Undetected => UNDETECTED_FEEDBACK.to_string(),
        VerdictStatus::Analyzing => format!(
            "Pose detection active for {exercise}. Note: Model is only trained for {trained}. For accurate feedback, please use the {} exercise.",
            capitalize(trained)
        ),
        VerdictStatus::Correct | VerdictStatus::Incorrect => {
            classified_feedback(exercise, status == VerdictStatus::Correct, trained)
        }
    }
}

fn classified_feedback(exercise: &str, correct: bool, trained: &str) -> String {
    if exercise == "squats" {
        return if correct { SQUAT_CORRECT } else { SQUAT_INCORRECT }.to_string();
    }

    if let Some((_, name)) = KNOWN_EXERCISES.iter().find(|(key, _)| *key == exercise) {
        return format!(
            "{name} detected. Note: Model is only trained for {trained}. For accurate form feedback, please use the {} exercise.",
            capitalize(trained)
        );
    }

    let message = if correct { GENERIC_CORRECT } else { GENERIC_INCORRECT };
    message.to_string()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squat_feedback() {
        assert_eq!(
            feedback_for("squats", VerdictStatus::Correct, "squats"),
            SQUAT_CORRECT
        );
        assert_eq!(
            feedback_for("squats", VerdictStatus::Incorrect, "squats"),
            SQUAT_INCORRECT
        );
    }

    #[test]
    fn test_undetected_ignores_exercise() {
        for exercise in ["squats", "arm-raise", "jumping-jacks"] {
            assert_eq!(
                feedback_for(exercise, VerdictStatus::Undetected, "squats"),
                UNDETECTED_FEEDBACK
            );
        }
    }

    #[test]
    fn test_analyzing_names_requested_exercise() {
        let feedback = feedback_for("arm-raise", VerdictStatus::Analyzing, "squats");
        assert_eq!(
            feedback,
            "Pose detection active for arm-raise. Note: Model is only trained for squats. For accurate feedback, please use the Squats exercise."
        );
    }

    #[test]
    fn test_known_untrained_and_generic_feedback() {
        assert!(feedback_for("knee-flexion", VerdictStatus::Correct, "squats")
            .starts_with("Knee flexion detected."));
        assert_eq!(
            feedback_for("lunges", VerdictStatus::Correct, "squats"),
            GENERIC_CORRECT
        );
        assert_eq!(
            feedback_for("lunges", VerdictStatus::Incorrect, "squats"),
            GENERIC_INCORRECT
        );
    }

    #[test]
    fn test_feedback_is_deterministic() {
        let a = feedback_for("squats", VerdictStatus::Correct, "squats");
        let b = feedback_for("squats", VerdictStatus::Correct, "squats");
        assert_eq!(a, b);
    }
}
